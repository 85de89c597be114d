//! The Current/Desired snapshot exchanged with handlers.
//!
//! A [`Computed`] is produced once per resource per compute pass and is
//! never mutated afterwards. Constructors enforce the shape that the
//! instruction implies:
//!
//! ```text
//!   instruction   current   desired   id
//!   ───────────   ───────   ───────   ─────────────────
//!   NOOP          some/none none      current id or ""
//!   CREATE        none      some      ""
//!   UPDATE        some      some      current id
//!   DELETE        some      none      current id
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::{CloudResource, ResourceKind};

/// What should happen to a resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    #[default]
    Noop,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Noop => "NOOP",
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Computed {
    kind: ResourceKind,
    instruction: Instruction,
    id: String,
    name: String,
    zone: Option<String>,
    /// Seconds to wait after booting before the resource is considered up.
    setup_grace_period: u64,
    current: Option<CloudResource>,
    desired: Option<CloudResource>,
    parent: Option<Box<Computed>>,
}

impl Computed {
    fn build(
        kind: ResourceKind,
        instruction: Instruction,
        current: Option<CloudResource>,
        desired: Option<CloudResource>,
    ) -> Self {
        let source = current.as_ref().or(desired.as_ref());
        let name = source.map(|r| r.name.clone()).unwrap_or_default();
        let zone = if kind.is_global() {
            None
        } else {
            source.and_then(|r| r.zone.clone())
        };
        let id = current.as_ref().map(|r| r.id.clone()).unwrap_or_default();
        Self {
            kind,
            instruction,
            id,
            name,
            zone,
            setup_grace_period: 0,
            current,
            desired,
            parent: None,
        }
    }

    /// Observed state, nothing to do.
    pub fn noop(kind: ResourceKind, current: CloudResource) -> Self {
        Self::build(kind, Instruction::Noop, Some(current), None)
    }

    /// A resource that no longer exists in the cloud.
    pub fn absent(kind: ResourceKind, name: impl Into<String>, zone: Option<String>) -> Self {
        let mut c = Self::build(kind, Instruction::Noop, None, None);
        c.name = name.into();
        if !kind.is_global() {
            c.zone = zone;
        }
        c
    }

    pub fn create(kind: ResourceKind, desired: CloudResource) -> Self {
        Self::build(kind, Instruction::Create, None, Some(desired))
    }

    pub fn update(kind: ResourceKind, current: CloudResource, desired: CloudResource) -> Self {
        Self::build(kind, Instruction::Update, Some(current), Some(desired))
    }

    pub fn delete(kind: ResourceKind, current: CloudResource) -> Self {
        Self::build(kind, Instruction::Delete, Some(current), None)
    }

    pub fn with_parent(mut self, parent: Computed) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn with_setup_grace_period(mut self, secs: u64) -> Self {
        self.setup_grace_period = secs;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    /// Empty while the underlying object does not exist.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` for global kinds.
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    pub fn setup_grace_period(&self) -> u64 {
        self.setup_grace_period
    }

    pub fn current(&self) -> Option<&CloudResource> {
        self.current.as_ref()
    }

    pub fn desired(&self) -> Option<&CloudResource> {
        self.desired.as_ref()
    }

    pub fn parent(&self) -> Option<&Computed> {
        self.parent.as_deref()
    }
}
