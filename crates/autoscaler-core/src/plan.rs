//! Plan selection.
//!
//! A plan is one named step on a resource's scaling dimension (core and
//! memory, connections per second, bandwidth, fleet size). Plans are
//! always sorted ascending before use; the selector then answers "what
//! is one step up/down from the current value" or "is the named plan a
//! legal target for this direction".
//!
//! Nothing here performs I/O.

use std::cmp::Ordering;
use std::fmt;

use autoscaler_types::{DEFAULT_NAME, ElbSpec, RequestType, RouterSpec, ServerSpec};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("desired plan {0:?} not found")]
    NotFound(String),

    #[error("desired plan {0:?} is smaller than current plan")]
    SmallerThanCurrent(String),

    #[error("desired plan {0:?} is larger than current plan")]
    LargerThanCurrent(String),
}

/// One point on a resource's scaling dimension.
pub trait ResourcePlan: Clone + fmt::Debug {
    /// The live value this plan is compared against.
    type Value: ?Sized;

    fn plan_name(&self) -> &str;

    fn equals(&self, current: &Self::Value) -> bool;

    /// True when this plan is strictly smaller than `current`.
    fn less_than(&self, current: &Self::Value) -> bool;

    /// Ordering between plans, used for sorting.
    fn less_than_plan(&self, other: &Self) -> bool;
}

/// `""` and `"default"` mean no plan was named.
pub fn is_named(desired_state_name: &str) -> bool {
    !desired_state_name.is_empty() && desired_state_name != DEFAULT_NAME
}

pub fn sort_plans<P: ResourcePlan>(plans: &[P]) -> Vec<P> {
    let mut sorted = plans.to_vec();
    sorted.sort_by(|a, b| {
        if a.less_than_plan(b) {
            Ordering::Less
        } else if b.less_than_plan(a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
    sorted
}

/// Whether `current` lies between the smallest and largest plan, inclusive.
pub fn within<P: ResourcePlan>(current: &P::Value, sorted: &[P]) -> bool {
    match sorted {
        [] => false,
        [only] => only.equals(current),
        [first, .., last] => {
            let above_min = first.equals(current) || first.less_than(current);
            let below_max = last.equals(current) || !last.less_than(current);
            above_min && below_max
        }
    }
}

fn at_or_below<P: ResourcePlan>(plan: &P, current: &P::Value) -> bool {
    plan.equals(current) || plan.less_than(current)
}

/// The plan one step above `current`, if any.
pub fn next_plan<'a, P: ResourcePlan>(current: &P::Value, sorted: &'a [P]) -> Option<&'a P> {
    match sorted {
        [] => None,
        [only] => (only.equals(current) || !only.less_than(current)).then_some(only),
        [first, ..] if !within(current, sorted) => (!first.less_than(current)).then_some(first),
        _ => {
            let mut passed_current = false;
            for plan in sorted {
                if at_or_below(plan, current) {
                    passed_current = true;
                } else if passed_current {
                    return Some(plan);
                }
            }
            None
        }
    }
}

/// The plan one step below `current`, if any.
pub fn prev_plan<'a, P: ResourcePlan>(current: &P::Value, sorted: &'a [P]) -> Option<&'a P> {
    match sorted {
        [] => None,
        [only] => at_or_below(only, current).then_some(only),
        [.., last] if !within(current, sorted) => {
            (!last.equals(current) && last.less_than(current)).then_some(last)
        }
        _ => {
            let idx = sorted
                .iter()
                .enumerate()
                .skip(1)
                .find(|(_, plan)| plan.equals(current) || !plan.less_than(current))
                .map(|(i, _)| i)?;
            let prev = &sorted[idx - 1];
            (!prev.equals(current)).then_some(prev)
        }
    }
}

/// Pick the plan a request should move the resource to.
///
/// A named plan must exist and must not point against the request's
/// direction; a plan equal to `current` is accepted for either
/// direction. Without a name, Up and Down move one step and Keep
/// selects nothing. `Ok(None)` means there is nowhere to go.
pub fn desired_plan<P: ResourcePlan>(
    request_type: RequestType,
    desired_state_name: &str,
    current: &P::Value,
    plans: &[P],
) -> Result<Option<P>, PlanError> {
    let sorted = sort_plans(plans);

    if is_named(desired_state_name) {
        let found = sorted
            .iter()
            .find(|p| p.plan_name() == desired_state_name)
            .ok_or_else(|| PlanError::NotFound(desired_state_name.to_string()))?;
        match request_type {
            RequestType::Up if found.less_than(current) => {
                return Err(PlanError::SmallerThanCurrent(desired_state_name.to_string()));
            }
            RequestType::Down if !at_or_below(found, current) => {
                return Err(PlanError::LargerThanCurrent(desired_state_name.to_string()));
            }
            _ => {}
        }
        return Ok(Some(found.clone()));
    }

    let selected = match request_type {
        RequestType::Up => next_plan(current, &sorted),
        RequestType::Down => prev_plan(current, &sorted),
        RequestType::Keep => None,
    };
    Ok(selected.cloned())
}

// ── Concrete plans ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPlan {
    #[serde(default)]
    pub name: String,
    pub core: u32,
    /// Memory size in GB.
    pub memory: u32,
}

impl ServerPlan {
    pub fn new(core: u32, memory: u32) -> Self {
        Self {
            name: String::new(),
            core,
            memory,
        }
    }
}

impl ResourcePlan for ServerPlan {
    type Value = ServerSpec;

    fn plan_name(&self) -> &str {
        &self.name
    }

    fn equals(&self, current: &ServerSpec) -> bool {
        self.core == current.core && self.memory == current.memory
    }

    fn less_than(&self, current: &ServerSpec) -> bool {
        (self.core, self.memory) < (current.core, current.memory)
    }

    fn less_than_plan(&self, other: &Self) -> bool {
        (self.core, self.memory) < (other.core, other.memory)
    }
}

/// Plans used when a server definition lists none.
pub fn default_server_plans() -> Vec<ServerPlan> {
    [(2, 4), (4, 8), (4, 16), (8, 16), (10, 24), (10, 32), (10, 48)]
        .into_iter()
        .map(|(core, memory)| ServerPlan::new(core, memory))
        .collect()
}

/// Fleet size of a server group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerGroupPlan {
    #[serde(default)]
    pub name: String,
    pub size: usize,
}

impl ResourcePlan for ServerGroupPlan {
    type Value = usize;

    fn plan_name(&self) -> &str {
        &self.name
    }

    fn equals(&self, current: &usize) -> bool {
        self.size == *current
    }

    fn less_than(&self, current: &usize) -> bool {
        self.size < *current
    }

    fn less_than_plan(&self, other: &Self) -> bool {
        self.size < other.size
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElbPlan {
    #[serde(default)]
    pub name: String,
    pub cps: u32,
}

impl ResourcePlan for ElbPlan {
    type Value = ElbSpec;

    fn plan_name(&self) -> &str {
        &self.name
    }

    fn equals(&self, current: &ElbSpec) -> bool {
        self.cps == current.cps
    }

    fn less_than(&self, current: &ElbSpec) -> bool {
        self.cps < current.cps
    }

    fn less_than_plan(&self, other: &Self) -> bool {
        self.cps < other.cps
    }
}

pub fn default_elb_plans() -> Vec<ElbPlan> {
    [100, 500, 1_000, 5_000, 10_000, 50_000, 100_000]
        .into_iter()
        .map(|cps| ElbPlan {
            name: String::new(),
            cps,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterPlan {
    #[serde(default)]
    pub name: String,
    /// Bandwidth in Mbps.
    pub band_width: u32,
}

impl ResourcePlan for RouterPlan {
    type Value = RouterSpec;

    fn plan_name(&self) -> &str {
        &self.name
    }

    fn equals(&self, current: &RouterSpec) -> bool {
        self.band_width == current.band_width
    }

    fn less_than(&self, current: &RouterSpec) -> bool {
        self.band_width < current.band_width
    }

    fn less_than_plan(&self, other: &Self) -> bool {
        self.band_width < other.band_width
    }
}

pub fn default_router_plans() -> Vec<RouterPlan> {
    [100, 250, 500, 1_000, 1_500, 2_000, 2_500, 3_000, 5_000]
        .into_iter()
        .map(|band_width| RouterPlan {
            name: String::new(),
            band_width,
        })
        .collect()
}
