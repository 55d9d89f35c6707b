use std::sync::{Mutex, RwLock};

use ahash::{HashMap, HashMapExt};
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use smartstring::alias::String;
use tracing::debug;

use crate::poly::{Variable, VariableType};

static VARIABLES: Lazy<VariableRegistry> = Lazy::new(VariableRegistry::new);

struct IdCounters {
    next_id: u64,
    per_type: [usize; VariableType::COUNT],
    persistent: Vec<(Variable, Option<String>)>,
}

impl IdCounters {
    fn new() -> IdCounters {
        IdCounters {
            next_id: 1,
            per_type: [0; VariableType::COUNT],
            persistent: vec![],
        }
    }

    fn fresh_variable_impl(&mut self, var_type: VariableType) -> Variable {
        if self.next_id > Variable::MAX_ID {
            panic!("Too many variables defined");
        }

        let v = Variable::raw(self.next_id, var_type, 0);
        self.next_id += 1;
        self.per_type[var_type.index()] += 1;
        v
    }
}

struct NameTable {
    names: HashMap<Variable, String>,
    reverse: HashMap<String, SmallVec<[Variable; 1]>>,
    prefix: String,
}

impl NameTable {
    fn new() -> NameTable {
        NameTable {
            names: HashMap::new(),
            reverse: HashMap::new(),
            prefix: "_".into(),
        }
    }

    fn set_name_impl(&mut self, v: Variable, name: &str) {
        assert!(v.is_valid(), "Cannot name NO_VARIABLE");

        if let Some(old) = self.names.insert(v, name.into()) {
            if let Some(vars) = self.reverse.get_mut(&old) {
                vars.retain(|x| *x != v);
                if vars.is_empty() {
                    self.reverse.remove(&old);
                }
            }
        }

        self.reverse.entry(name.into()).or_default().push(v);
    }
}

/// Allocates variables and keeps track of their names.
///
/// Every variable gets a unique id from a single counter that is shared by all
/// variable types, so that consecutive allocations yield consecutive ids. The names
/// are stored separately from the counters, so that naming and printing do not
/// contend with allocation.
///
/// A process-wide registry is available through [VariableRegistry::global].
pub struct VariableRegistry {
    counters: Mutex<IdCounters>,
    names: RwLock<NameTable>,
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableRegistry {
    pub fn new() -> VariableRegistry {
        VariableRegistry {
            counters: Mutex::new(IdCounters::new()),
            names: RwLock::new(NameTable::new()),
        }
    }

    /// Get the process-wide registry.
    pub fn global() -> &'static VariableRegistry {
        &VARIABLES
    }

    /// Create a new variable of type `var_type`.
    pub fn fresh_variable(&self, var_type: VariableType) -> Variable {
        self.counters.lock().unwrap().fresh_variable_impl(var_type)
    }

    /// Create a new variable with a name.
    pub fn fresh_named_variable(&self, name: &str, var_type: VariableType) -> Variable {
        let v = self.fresh_variable(var_type);
        self.set_name(v, name);
        v
    }

    /// Create a new variable that is recreated with the same id by [VariableRegistry::clear].
    pub fn fresh_persistent_variable(&self, var_type: VariableType) -> Variable {
        let mut counters = self.counters.lock().unwrap();
        let v = counters.fresh_variable_impl(var_type);
        counters.persistent.push((v, None));
        v
    }

    /// Create a new named variable that is recreated with the same id and name by
    /// [VariableRegistry::clear].
    pub fn fresh_persistent_named_variable(&self, name: &str, var_type: VariableType) -> Variable {
        let mut counters = self.counters.lock().unwrap();
        let v = counters.fresh_variable_impl(var_type);
        counters.persistent.push((v, Some(name.into())));
        self.names.write().unwrap().set_name_impl(v, name);
        v
    }

    /// Set the name of a variable, replacing any previous name.
    pub fn set_name(&self, v: Variable, name: &str) {
        self.names.write().unwrap().set_name_impl(v, name);
    }

    /// Get the name of a variable. A variable without a name is printed
    /// as its id, preceded by the current prefix and `x_`.
    pub fn name(&self, v: Variable) -> String {
        if !v.is_valid() {
            return "NO_VARIABLE".into();
        }

        let names = self.names.read().unwrap();
        match names.names.get(&v) {
            Some(n) => n.clone(),
            None => {
                let mut n = names.prefix.clone();
                n.push_str("x_");
                n.push_str(&v.id().to_string());
                n
            }
        }
    }

    /// Find the variable with the given name. If several variables share the name,
    /// the smallest one is returned.
    pub fn find_by_name(&self, name: &str) -> Option<Variable> {
        let names = self.names.read().unwrap();
        names
            .reverse
            .get(name)
            .and_then(|vars| vars.iter().min().cloned())
    }

    /// Set the prefix that is used to print variables without a name.
    pub fn set_prefix(&self, prefix: &str) {
        self.names.write().unwrap().prefix = prefix.into();
    }

    /// The number of variables of type `var_type` that were allocated since the last clear.
    pub fn num_variables(&self, var_type: VariableType) -> usize {
        self.counters.lock().unwrap().per_type[var_type.index()]
    }

    /// The number of variables that were allocated since the last clear.
    pub fn num_variables_total(&self) -> usize {
        self.counters.lock().unwrap().per_type.iter().sum()
    }

    /// Forget all variables and names, except for the persistent variables, which are
    /// restored with their original ids and names. Any other variable that was handed
    /// out before should no longer be used.
    pub fn clear(&self) {
        let mut counters = self.counters.lock().unwrap();
        let mut names = self.names.write().unwrap();

        debug!(
            "Clearing {} variables, keeping {} persistent ones",
            counters.next_id - 1,
            counters.persistent.len()
        );

        counters.next_id = 1;
        counters.per_type = [0; VariableType::COUNT];
        names.names.clear();
        names.reverse.clear();

        let persistent = std::mem::take(&mut counters.persistent);
        for (v, name) in &persistent {
            counters.next_id = counters.next_id.max(v.id() + 1);
            counters.per_type[v.var_type().index()] += 1;
            if let Some(n) = name {
                names.set_name_impl(*v, n);
            }
        }
        counters.persistent = persistent;
    }
}

/// Create a new variable in the global registry.
pub fn fresh_variable(var_type: VariableType) -> Variable {
    VariableRegistry::global().fresh_variable(var_type)
}

/// Create a new named variable in the global registry.
pub fn fresh_named_variable(name: &str, var_type: VariableType) -> Variable {
    VariableRegistry::global().fresh_named_variable(name, var_type)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::poly::{Variable, VariableType};

    use super::{fresh_named_variable, VariableRegistry};

    #[test]
    fn consecutive_ids() {
        let r = VariableRegistry::new();
        let a = r.fresh_variable(VariableType::Real);
        let b = r.fresh_variable(VariableType::Real);
        let c = r.fresh_variable(VariableType::Bool);

        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), a.id() + 1);
        assert_eq!(c.id(), b.id() + 1);
        assert!(a < b && b < c);
        assert_eq!(r.num_variables(VariableType::Real), 2);
        assert_eq!(r.num_variables(VariableType::Bool), 1);
        assert_eq!(r.num_variables_total(), 3);
    }

    #[test]
    fn names() {
        let r = VariableRegistry::new();
        let x = r.fresh_named_variable("x", VariableType::Real);
        let y = r.fresh_variable(VariableType::Int);

        assert_eq!(r.name(x), "x");
        assert_eq!(r.name(y), "_x_2");
        assert_eq!(r.name(Variable::NO_VARIABLE), "NO_VARIABLE");

        r.set_prefix("aux");
        assert_eq!(r.name(y), "auxx_2");

        r.set_name(y, "x");
        assert_eq!(r.find_by_name("x"), Some(x));
        r.set_name(x, "z");
        assert_eq!(r.find_by_name("x"), Some(y));
        assert_eq!(r.find_by_name("z"), Some(x));
        assert_eq!(r.find_by_name("w"), None);
    }

    #[test]
    fn persistent_survive_clear() {
        let r = VariableRegistry::new();
        let _ = r.fresh_variable(VariableType::Real);
        let p = r.fresh_persistent_named_variable("p", VariableType::Int);
        let q = r.fresh_persistent_variable(VariableType::Bool);
        let t = r.fresh_named_variable("t", VariableType::Real);

        r.clear();

        assert_eq!(r.find_by_name("t"), None);
        assert_eq!(r.find_by_name("p"), Some(p));
        assert_eq!(r.num_variables_total(), 2);
        assert_eq!(r.num_variables(VariableType::Int), 1);

        let n = r.fresh_variable(VariableType::Real);
        assert_eq!(n.id(), q.id() + 1);
        assert_eq!(n.id(), t.id());
    }

    #[test]
    fn concurrent_allocation() {
        let r = Arc::new(VariableRegistry::new());

        let mut ids: Vec<u64> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let r = r.clone();
                    s.spawn(move || {
                        (0..100)
                            .map(|_| r.fresh_variable(VariableType::Real).id())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(ids[0], 1);
        assert_eq!(ids[399], 400);
    }

    #[test]
    fn global_display() {
        let v = fresh_named_variable("state_display_v", VariableType::Real);
        assert_eq!(v.to_string(), "state_display_v");
        assert_eq!(format!("{:?}", v.with_rank(2)), format!("x_{}:Real@2", v.id()));
    }
}
