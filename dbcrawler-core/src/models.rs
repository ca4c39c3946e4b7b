//! Catalog entities.
//!
//! Tables, columns and indexes are registered by the base pass; the
//! enrichment retrievers only add to them. Triggers, constraints and
//! privileges are find-or-created while enriching.

use crate::attributes::{AttributeBag, impl_attributed, impl_defined};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// An enumeration read from metadata text, with an explicit unknown value.
pub trait MetadataEnum: Sized + Copy {
    /// The sentinel used when a source value is missing or unrecognised.
    const UNKNOWN: Self;

    /// Parses vendor text. Matching ignores case, surrounding blanks and
    /// the difference between `_` and a space.
    fn parse_metadata(text: &str) -> Option<Self>;

    /// Like [`MetadataEnum::parse_metadata`], falling back to the sentinel.
    fn from_metadata(text: Option<&str>) -> Self {
        text.and_then(Self::parse_metadata).unwrap_or(Self::UNKNOWN)
    }
}

/// Uppercases and collapses separators so `instead_of` matches `INSTEAD OF`.
fn canonical_token(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

macro_rules! metadata_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal $(| $alias:literal)* ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )*
            /// Missing or unrecognised source value
            #[default]
            Unknown,
        }

        impl MetadataEnum for $name {
            const UNKNOWN: Self = Self::Unknown;

            fn parse_metadata(text: &str) -> Option<Self> {
                match canonical_token(text).as_str() {
                    $( $text $(| $alias)* => Some(Self::$variant), )*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $( Self::$variant => f.write_str($text), )*
                    Self::Unknown => f.write_str("unknown"),
                }
            }
        }
    };
}

metadata_enum! {
    /// Statement kind a trigger fires on.
    pub enum EventManipulationType {
        /// Row insertion
        Insert => "INSERT",
        /// Row update
        Update => "UPDATE",
        /// Row deletion
        Delete => "DELETE",
    }
}

metadata_enum! {
    /// Whether a trigger fires per row or per statement.
    pub enum ActionOrientationType {
        /// Fires once per affected row
        Row => "ROW",
        /// Fires once per statement
        Statement => "STATEMENT",
    }
}

metadata_enum! {
    /// When a trigger fires relative to its event.
    pub enum ConditionTimingType {
        /// Before the event
        Before => "BEFORE",
        /// After the event
        After => "AFTER",
        /// Instead of the event (views)
        InsteadOf => "INSTEAD OF",
    }
}

metadata_enum! {
    /// View `WITH CHECK OPTION` setting.
    pub enum CheckOptionType {
        /// No check option
        None => "NONE",
        /// Cascaded check option
        Cascaded => "CASCADED" | "CASCADE",
        /// Local check option
        Local => "LOCAL",
    }
}

metadata_enum! {
    /// Kind of table constraint.
    pub enum TableConstraintType {
        /// Primary key
        PrimaryKey => "PRIMARY KEY" | "P",
        /// Foreign key
        ForeignKey => "FOREIGN KEY" | "R",
        /// Unique key
        Unique => "UNIQUE" | "U",
        /// Check constraint
        Check => "CHECK" | "C",
    }
}

/// Entities addressable by name inside their owner.
pub trait Named {
    /// Canonical name, used as the lookup key.
    fn name(&self) -> &str;
}

/// Ordered entities with a name → slot index.
///
/// Serializes as a plain list; the index is rebuilt on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    from = "Vec<T>",
    into = "Vec<T>",
    bound(
        serialize = "T: Serialize + Clone",
        deserialize = "T: Deserialize<'de> + Named"
    )
)]
pub struct NamedSet<T> {
    items: Vec<T>,
    slots: HashMap<String, usize>,
}

impl<T> Default for NamedSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            slots: HashMap::new(),
        }
    }
}

impl<T: Named> NamedSet<T> {
    /// Adds an entity, or returns the slot of the existing one with that name.
    pub fn insert(&mut self, item: T) -> std::result::Result<usize, usize> {
        if let Some(&slot) = self.slots.get(item.name()) {
            return Err(slot);
        }
        let slot = self.items.len();
        self.slots.insert(item.name().to_string(), slot);
        self.items.push(item);
        Ok(slot)
    }

    /// Slot of the named entity, creating it with `create` on first sight.
    pub fn find_or_insert_with(&mut self, name: &str, create: impl FnOnce() -> T) -> usize {
        match self.slot(name) {
            Some(slot) => slot,
            None => {
                let slot = self.items.len();
                self.slots.insert(name.to_string(), slot);
                self.items.push(create());
                slot
            }
        }
    }

    /// Slot for a canonical name.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    /// Entity by canonical name.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.slot(name).and_then(|slot| self.items.get(slot))
    }

    /// Mutable entity by canonical name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let slot = self.slot(name)?;
        self.items.get_mut(slot)
    }
}

impl<T> NamedSet<T> {
    /// Entity by slot.
    pub fn at(&self, slot: usize) -> Option<&T> {
        self.items.get(slot)
    }

    /// Mutable entity by slot.
    pub fn at_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.items.get_mut(slot)
    }

    /// Entities in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Named> From<Vec<T>> for NamedSet<T> {
    fn from(items: Vec<T>) -> Self {
        let mut slots = HashMap::with_capacity(items.len());
        for (slot, item) in items.iter().enumerate() {
            slots.entry(item.name().to_string()).or_insert(slot);
        }
        Self { items, slots }
    }
}

impl<T> From<NamedSet<T>> for Vec<T> {
    fn from(set: NamedSet<T>) -> Self {
        set.items
    }
}

impl<'a, T> IntoIterator for &'a NamedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

macro_rules! impl_named {
    ($($entity:ty),* $(,)?) => {
        $(
            impl Named for $entity {
                fn name(&self) -> &str {
                    &self.name
                }
            }
        )*
    };
}

/// Catalog and schema a table lives in. Either part may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaRef {
    /// Catalog name, canonical form
    pub catalog: Option<String>,
    /// Schema name, canonical form
    pub schema: Option<String>,
}

impl SchemaRef {
    /// Creates a reference from canonical parts.
    pub fn new(catalog: Option<String>, schema: Option<String>) -> Self {
        Self { catalog, schema }
    }

    /// Present parts joined with `.`; empty when both are absent.
    pub fn full_name(&self) -> String {
        [self.catalog.as_deref(), self.schema.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl std::fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Arena handle for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub(crate) usize);

/// Handle for a column: owning table plus column slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId {
    /// Owning table
    pub table: TableId,
    /// Position in the table's column set
    pub slot: usize,
}

/// Handle for a table constraint: owning table plus constraint slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintId {
    /// Owning table
    pub table: TableId,
    /// Position in the table's constraint set
    pub slot: usize,
}

/// Extra state carried by views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDetails {
    /// `WITH CHECK OPTION` kind
    pub check_option: CheckOptionType,
    /// Whether the view accepts writes
    pub updatable: bool,
}

/// Base table or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableKind {
    /// Base table
    Table,
    /// View with its view-only state
    View(ViewDetails),
}

/// A table or view with everything it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Catalog and schema
    pub schema: SchemaRef,
    /// Canonical table name
    pub name: String,
    /// Base table or view
    pub kind: TableKind,
    /// Accumulated long-form definition
    pub definition: Option<String>,
    /// Columns in registration order
    pub columns: NamedSet<Column>,
    /// Indexes
    pub indexes: NamedSet<Index>,
    /// Triggers found by enrichment
    pub triggers: NamedSet<Trigger>,
    /// Constraints found by enrichment
    pub constraints: NamedSet<TableConstraint>,
    /// Table-level privileges
    pub privileges: NamedSet<Privilege>,
    /// Vendor attributes
    pub attributes: AttributeBag,
}

impl Table {
    /// Creates an empty table of the given kind.
    pub fn new(schema: SchemaRef, name: impl Into<String>, kind: TableKind) -> Self {
        Self {
            schema,
            name: name.into(),
            kind,
            definition: None,
            columns: NamedSet::default(),
            indexes: NamedSet::default(),
            triggers: NamedSet::default(),
            constraints: NamedSet::default(),
            privileges: NamedSet::default(),
            attributes: AttributeBag::new(),
        }
    }

    /// Schema full name plus table name.
    pub fn full_name(&self) -> String {
        let schema = self.schema.full_name();
        if schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", schema, self.name)
        }
    }

    /// Whether this is the view variant.
    pub fn is_view(&self) -> bool {
        matches!(self.kind, TableKind::View(_))
    }

    /// View details, when this is a view.
    pub fn view(&self) -> Option<&ViewDetails> {
        match &self.kind {
            TableKind::View(details) => Some(details),
            TableKind::Table => None,
        }
    }

    /// Mutable view details, when this is a view.
    pub fn view_mut(&mut self) -> Option<&mut ViewDetails> {
        match &mut self.kind {
            TableKind::View(details) => Some(details),
            TableKind::Table => None,
        }
    }

    /// Column by canonical name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Index by canonical name.
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    /// Trigger by canonical name.
    pub fn trigger(&self, name: &str) -> Option<&Trigger> {
        self.triggers.get(name)
    }

    /// Constraint by canonical name.
    pub fn constraint(&self, name: &str) -> Option<&TableConstraint> {
        self.constraints.get(name)
    }

    /// Slot of the named trigger, creating an empty one on first sight.
    pub fn find_or_create_trigger(&mut self, name: &str) -> usize {
        self.triggers
            .find_or_insert_with(name, || Trigger::new(name))
    }

    /// Slot of the named constraint, creating an empty one on first sight.
    pub fn find_or_create_constraint(&mut self, name: &str) -> usize {
        self.constraints
            .find_or_insert_with(name, || TableConstraint::new(name))
    }
}

/// A table column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Canonical column name
    pub name: String,
    /// 1-based position in the table
    pub ordinal_position: u32,
    /// Reported type name, if known
    pub data_type: Option<String>,
    /// Column-level privileges
    pub privileges: NamedSet<Privilege>,
    /// Vendor attributes
    pub attributes: AttributeBag,
}

impl Column {
    /// Creates a column at an ordinal position.
    pub fn new(name: impl Into<String>, ordinal_position: u32) -> Self {
        Self {
            name: name.into(),
            ordinal_position,
            data_type: None,
            privileges: NamedSet::default(),
            attributes: AttributeBag::new(),
        }
    }
}

/// A table index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Canonical index name
    pub name: String,
    /// Whether the index enforces uniqueness
    pub unique: bool,
    /// Indexed column names in key order
    pub columns: Vec<String>,
    /// Accumulated index definition
    pub definition: Option<String>,
    /// Vendor attributes
    pub attributes: AttributeBag,
}

impl Index {
    /// Creates an index with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: false,
            columns: Vec::new(),
            definition: None,
            attributes: AttributeBag::new(),
        }
    }
}

/// A trigger, created lazily by the trigger retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// Canonical trigger name
    pub name: String,
    /// Event that fires the trigger
    pub event_manipulation_type: EventManipulationType,
    /// Firing order among triggers on the same event
    pub action_order: i64,
    /// Accumulated `WHEN` condition text
    pub action_condition: Option<String>,
    /// Accumulated trigger body
    pub action_statement: Option<String>,
    /// Fires per row or per statement
    pub action_orientation: ActionOrientationType,
    /// Fires before, after or instead of the event
    pub condition_timing: ConditionTimingType,
    /// Vendor attributes
    pub attributes: AttributeBag,
}

impl Trigger {
    /// Creates a trigger with every kind unknown.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event_manipulation_type: EventManipulationType::Unknown,
            action_order: 0,
            action_condition: None,
            action_statement: None,
            action_orientation: ActionOrientationType::Unknown,
            condition_timing: ConditionTimingType::Unknown,
            attributes: AttributeBag::new(),
        }
    }

    /// Appends a condition fragment.
    pub fn append_action_condition(&mut self, fragment: Option<&str>) {
        crate::attributes::append_text(&mut self.action_condition, fragment);
    }

    /// Appends a statement fragment.
    pub fn append_action_statement(&mut self, fragment: Option<&str>) {
        crate::attributes::append_text(&mut self.action_statement, fragment);
    }
}

/// A table constraint with its ordered columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConstraint {
    /// Canonical constraint name
    pub name: String,
    /// Primary key, foreign key, unique or check
    pub constraint_type: TableConstraintType,
    /// Whether checking can be deferred
    pub deferrable: bool,
    /// Whether checking starts deferred
    pub initially_deferred: bool,
    /// Accumulated definition, such as a check clause
    pub definition: Option<String>,
    /// Constrained columns in row order
    pub columns: Vec<TableConstraintColumn>,
    /// Vendor attributes
    pub attributes: AttributeBag,
}

impl TableConstraint {
    /// Creates a constraint of unknown type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint_type: TableConstraintType::Unknown,
            deferrable: false,
            initially_deferred: false,
            definition: None,
            columns: Vec::new(),
            attributes: AttributeBag::new(),
        }
    }
}

/// A column's membership in a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConstraintColumn {
    /// Handle of the constrained column
    pub column: ColumnId,
    /// Canonical column name
    pub column_name: String,
    /// Position within the constraint
    pub ordinal_position: u32,
}

/// One grant of a privilege.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Grant {
    /// Who granted the privilege
    pub grantor: Option<String>,
    /// Who received it
    pub grantee: Option<String>,
    /// Whether the grantee may grant it on
    pub grantable: bool,
}

/// A named privilege and everyone it was granted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    /// Privilege name, such as `SELECT`
    pub name: String,
    /// Distinct grants of this privilege
    pub grants: BTreeSet<Grant>,
}

impl Privilege {
    /// Creates a privilege with no grants.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grants: BTreeSet::new(),
        }
    }
}

/// Entities that can hold privileges (tables and columns).
pub trait Privileged {
    /// Owner kind, for diagnostics.
    const OWNER_KIND: &'static str;

    /// The owner's privileges.
    fn privileges(&self) -> &NamedSet<Privilege>;

    /// Mutable access to the owner's privileges.
    fn privileges_mut(&mut self) -> &mut NamedSet<Privilege>;

    /// Records a grant, creating the privilege on first sight. Re-recording
    /// an identical grant is a no-op.
    fn grant(&mut self, privilege_name: &str, grant: Grant) {
        let privileges = self.privileges_mut();
        let slot = privileges.find_or_insert_with(privilege_name, || Privilege::new(privilege_name));
        if let Some(privilege) = privileges.at_mut(slot) {
            privilege.grants.insert(grant);
        }
    }
}

impl Privileged for Table {
    const OWNER_KIND: &'static str = "table";

    fn privileges(&self) -> &NamedSet<Privilege> {
        &self.privileges
    }

    fn privileges_mut(&mut self) -> &mut NamedSet<Privilege> {
        &mut self.privileges
    }
}

impl Privileged for Column {
    const OWNER_KIND: &'static str = "column";

    fn privileges(&self) -> &NamedSet<Privilege> {
        &self.privileges
    }

    fn privileges_mut(&mut self) -> &mut NamedSet<Privilege> {
        &mut self.privileges
    }
}

impl_named!(Table, Column, Index, Trigger, TableConstraint, Privilege);
impl_attributed!(Table, Column, Index, Trigger, TableConstraint);
impl_defined!(Table, Index, TableConstraint);
