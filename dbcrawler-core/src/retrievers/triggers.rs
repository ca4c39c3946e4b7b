//! Trigger retriever.
//!
//! Triggers are the one entity the base pass never creates: the first row
//! naming a trigger creates it, later rows for the same trigger update it.

use super::{
    FacetOutcome, KeyColumns, RowKey, RowRejection, first_string, resolve_table, run_facet,
    table_mut,
};
use crate::attributes::Attributed;
use crate::catalog::Catalog;
use crate::diagnostics::DiagnosticSink;
use crate::models::{ActionOrientationType, ConditionTimingType, EventManipulationType, MetadataEnum};
use crate::queries::{Facet, QueryTemplates};
use crate::source::MetadataSource;

const TRIGGER_KEY: KeyColumns = KeyColumns {
    catalog: &["TRIGGER_CATALOG"],
    schema: &["TRIGGER_SCHEMA"],
    table: &["EVENT_OBJECT_TABLE"],
};

/// Vendors disagree on the timing column name.
const TIMING_COLUMNS: &[&str] = &["ACTION_TIMING", "CONDITION_TIMING"];

/// Find-or-creates triggers and sets their fields row by row.
///
/// Scalar fields take the latest non-null value; condition and statement
/// text accumulate. Unrecognised kinds become `Unknown`.
pub async fn retrieve_triggers(
    catalog: &mut Catalog,
    queries: &QueryTemplates,
    source: &mut dyn MetadataSource,
    sink: &mut dyn DiagnosticSink,
) -> FacetOutcome {
    run_facet(Facet::Triggers, queries, source, sink, |mut row| {
        let key = RowKey::read(&mut row, &TRIGGER_KEY);
        let raw_name = row.string("TRIGGER_NAME");
        let table = resolve_table(catalog, &key)?;
        let Some(trigger_name) = raw_name
            .as_deref()
            .and_then(|name| catalog.identifiers().normalize(name))
        else {
            return Err(RowRejection::Skipped {
                name: key.display(None),
                reason: "trigger name is missing".to_string(),
            });
        };

        // Scalars are only overwritten by rows that carry them.
        let event_manipulation_type = row
            .has_value("EVENT_MANIPULATION")
            .then(|| row.enumeration("EVENT_MANIPULATION", EventManipulationType::Unknown));
        let action_order = row
            .has_value("ACTION_ORDER")
            .then(|| row.int("ACTION_ORDER", 0));
        let action_condition = row.text("ACTION_CONDITION");
        let action_statement = row.text("ACTION_STATEMENT");
        let action_orientation = row
            .has_value("ACTION_ORIENTATION")
            .then(|| row.enumeration("ACTION_ORIENTATION", ActionOrientationType::Unknown));
        let condition_timing = first_string(&mut row, TIMING_COLUMNS)
            .map(|timing| ConditionTimingType::from_metadata(Some(&timing)));
        let attributes = row.attributes();

        let owner = table_mut(catalog, table, &key)?;
        let slot = owner.find_or_create_trigger(&trigger_name);
        let trigger = owner
            .triggers
            .at_mut(slot)
            .ok_or_else(|| RowRejection::not_found("trigger", key.display(Some(&trigger_name))))?;
        if let Some(kind) = event_manipulation_type {
            trigger.event_manipulation_type = kind;
        }
        if let Some(order) = action_order {
            trigger.action_order = order;
        }
        trigger.append_action_condition(action_condition.as_deref());
        trigger.append_action_statement(action_statement.as_deref());
        if let Some(orientation) = action_orientation {
            trigger.action_orientation = orientation;
        }
        if let Some(timing) = condition_timing {
            trigger.condition_timing = timing;
        }
        trigger.merge_attributes(attributes);
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::source::{MemorySource, MetadataRow};

    fn trigger_row(name: &str) -> MetadataRow {
        trigger_row_on("T", name)
    }

    fn trigger_row_on(table: &str, name: &str) -> MetadataRow {
        MetadataRow::new()
            .with("TRIGGER_CATALOG", serde_json::Value::Null)
            .with("TRIGGER_SCHEMA", "S")
            .with("TRIGGER_NAME", name)
            .with("EVENT_OBJECT_TABLE", table)
    }

    async fn crawl_triggers(catalog: &mut Catalog, rows: Vec<MetadataRow>) -> FacetOutcome {
        let queries = QueryTemplates::new().with_query(Facet::Triggers, "Q");
        let mut source = MemorySource::new().with_rows("Q", rows);
        let mut sink = RecordingSink::new();
        retrieve_triggers(catalog, &queries, &mut source, &mut sink).await
    }

    #[tokio::test]
    async fn test_trigger_is_created_on_first_row() {
        let mut catalog = Catalog::default();
        let table = catalog.add_table(None, Some("S"), "T").unwrap();

        crawl_triggers(
            &mut catalog,
            vec![
                trigger_row("TRG_AUDIT")
                    .with("EVENT_MANIPULATION", "INSERT")
                    .with("ACTION_ORIENTATION", "ROW")
                    .with("ACTION_TIMING", "AFTER")
                    .with("ACTION_STATEMENT", "EXECUTE FUNCTION audit()"),
            ],
        )
        .await;

        let trigger = catalog.table(table).and_then(|t| t.trigger("TRG_AUDIT")).unwrap();
        assert_eq!(trigger.event_manipulation_type, EventManipulationType::Insert);
        assert_eq!(trigger.action_orientation, ActionOrientationType::Row);
        assert_eq!(trigger.condition_timing, ConditionTimingType::After);
        assert_eq!(trigger.action_statement.as_deref(), Some("EXECUTE FUNCTION audit()"));
        assert_eq!(trigger.action_condition, None);
    }

    #[tokio::test]
    async fn test_condition_timing_falls_back_to_secondary_column() {
        let mut catalog = Catalog::default();
        let table = catalog.add_table(None, Some("S"), "T").unwrap();

        crawl_triggers(
            &mut catalog,
            vec![
                trigger_row("TRG_A")
                    .with("ACTION_TIMING", serde_json::Value::Null)
                    .with("CONDITION_TIMING", "INSTEAD OF"),
                trigger_row("TRG_B").with("CONDITION_TIMING", "BEFORE"),
            ],
        )
        .await;

        let table = catalog.table(table).unwrap();
        assert_eq!(
            table.trigger("TRG_A").map(|t| t.condition_timing),
            Some(ConditionTimingType::InsteadOf)
        );
        assert_eq!(
            table.trigger("TRG_B").map(|t| t.condition_timing),
            Some(ConditionTimingType::Before)
        );
        // timing columns are consumed, not attributes
        assert!(table.trigger("TRG_A").unwrap().attributes().is_empty());
    }

    #[tokio::test]
    async fn test_statement_text_accumulates_across_rows() {
        let mut catalog = Catalog::default();
        let table = catalog.add_table(None, Some("S"), "T").unwrap();

        crawl_triggers(
            &mut catalog,
            vec![
                trigger_row("TRG").with("ACTION_STATEMENT", "BEGIN "),
                trigger_row("TRG").with("ACTION_STATEMENT", "END"),
            ],
        )
        .await;

        let trigger = catalog.table(table).and_then(|t| t.trigger("TRG")).unwrap();
        assert_eq!(trigger.action_statement.as_deref(), Some("BEGIN END"));
    }

    #[tokio::test]
    async fn test_rows_for_one_trigger_merge() {
        let mut catalog = Catalog::default();
        let table = catalog.add_table(None, Some("S"), "T").unwrap();

        crawl_triggers(
            &mut catalog,
            vec![
                trigger_row("TRG").with("EVENT_MANIPULATION", "UPDATE"),
                trigger_row("TRG").with("ACTION_ORDER", 2),
                trigger_row("TRG").with("EVENT_MANIPULATION", "TRUNCATE"),
            ],
        )
        .await;

        let table = catalog.table(table).unwrap();
        assert_eq!(table.triggers.len(), 1);
        let trigger = table.trigger("TRG").unwrap();
        assert_eq!(trigger.action_order, 2);
        // present but unrecognised coerces to the sentinel
        assert_eq!(trigger.event_manipulation_type, EventManipulationType::Unknown);
    }

    #[tokio::test]
    async fn test_unknown_table_creates_nothing() {
        let mut catalog = Catalog::default();
        let table = catalog.add_table(None, Some("S"), "T").unwrap();

        let outcome = crawl_triggers(&mut catalog, vec![trigger_row_on("U", "TRG")]).await;

        assert!(catalog.table(table).unwrap().triggers.is_empty());
        assert_eq!(outcome.stats().rows_skipped, 1);
    }
}
