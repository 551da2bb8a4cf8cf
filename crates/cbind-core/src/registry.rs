//! Registrar contract: duplicate guard and constant index
//!
//! The pipeline produces a pure declaration sequence; a registrar consumes
//! it and performs scope mutation, duplicate checks, and value indexing.
//! `ScopeRegistry` is the reference in-memory implementation. Registry
//! state lives for one registrar instance and is rebuilt fresh on every
//! invocation.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

use crate::decl::{Declaration, FunctionDecl};

/// Consumes the ordered declaration sequence produced by extraction
pub trait Registrar {
    /// Register one declaration into the target scope
    fn register(&mut self, decl: &Declaration);
}

/// What kind of symbol a name is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Constant,
    Type,
    Enum,
    Alias,
}

/// Signature facts retained per registered function
#[derive(Debug, Clone)]
struct FunctionSig {
    arity: usize,
    /// All parameters lack a concrete type constraint
    untyped: bool,
}

/// Reference in-memory scope: duplicate guard plus value→name index
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    symbols: HashMap<String, SymbolKind>,
    functions: HashMap<String, Vec<FunctionSig>>,
    ctors: HashSet<(String, bool)>,
    index: BTreeMap<i64, Vec<String>>,
    registered: Vec<Declaration>,
    skipped: Vec<String>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declarations accepted into the scope, in registration order
    pub fn registered(&self) -> &[Declaration] {
        &self.registered
    }

    /// Names skipped as already present
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Reverse value→name index over registered enumerators and integer
    /// constants; one name list per value, insertion order preserved
    pub fn constant_index(&self) -> &BTreeMap<i64, Vec<String>> {
        &self.index
    }

    /// Names registered for an integer value
    pub fn names_for(&self, value: i64) -> &[String] {
        self.index.get(&value).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name) || self.functions.contains_key(name)
    }

    fn skip(&mut self, name: &str, kind: &str) {
        info!("{} {} already defined, skipping", kind, name);
        self.skipped.push(name.to_string());
    }

    fn index_value(&mut self, value: i64, name: &str) {
        self.index.entry(value).or_default().push(name.to_string());
    }

    /// A function may be redefined unless an existing registration of the
    /// same arity accepts arguments of unconstrained type
    fn function_conflicts(&self, func: &FunctionDecl) -> bool {
        self.functions
            .get(&func.name)
            .map(|sigs| {
                sigs.iter()
                    .any(|sig| sig.arity == func.params.len() && sig.untyped)
            })
            .unwrap_or(false)
    }
}

impl Registrar for ScopeRegistry {
    fn register(&mut self, decl: &Declaration) {
        match decl {
            Declaration::Info(msg) => {
                info!("{}", msg);
            }
            Declaration::Constant(c) => {
                if self.symbols.contains_key(&c.name) {
                    self.skip(&c.name, "constant");
                    return;
                }
                self.symbols.insert(c.name.clone(), SymbolKind::Constant);
                if let Some(v) = c.value.as_int() {
                    self.index_value(v, &c.name);
                }
                self.registered.push(decl.clone());
            }
            Declaration::Type(s) => {
                if self.symbols.contains_key(&s.name) {
                    self.skip(&s.name, "type");
                    return;
                }
                self.symbols.insert(s.name.clone(), SymbolKind::Type);
                self.registered.push(decl.clone());
            }
            Declaration::Enum(e) => {
                if self.symbols.contains_key(&e.name) {
                    self.skip(&e.name, "enum");
                    return;
                }
                self.symbols.insert(e.name.clone(), SymbolKind::Enum);
                for member in &e.members {
                    self.index_value(member.value, &member.name);
                }
                self.registered.push(decl.clone());
            }
            Declaration::Alias(a) => {
                if self.symbols.contains_key(&a.name) {
                    self.skip(&a.name, "alias");
                    return;
                }
                self.symbols.insert(a.name.clone(), SymbolKind::Alias);
                self.registered.push(decl.clone());
            }
            Declaration::Function(f) => {
                if self.function_conflicts(f) {
                    self.skip(&f.name, "function");
                    return;
                }
                let untyped = f.params.iter().all(|p| p.ty.name.is_empty());
                self.functions
                    .entry(f.name.clone())
                    .or_default()
                    .push(FunctionSig {
                        arity: f.params.len(),
                        untyped,
                    });
                self.registered.push(decl.clone());
            }
            Declaration::Ctor(c) => {
                let key = (c.type_name.clone(), c.mutable);
                if self.ctors.contains(&key) {
                    self.skip(&c.type_name, "constructor for");
                    return;
                }
                self.ctors.insert(key);
                self.registered.push(decl.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{
        CType, ConstValue, ConstantDecl, EnumDecl, EnumMember, ParamDecl,
    };

    fn constant(name: &str, value: i64) -> Declaration {
        Declaration::Constant(ConstantDecl {
            name: name.into(),
            value: ConstValue::Int(value),
        })
    }

    #[test]
    fn test_duplicate_constant_skipped() {
        let mut reg = ScopeRegistry::new();
        reg.register(&constant("FOO", 42));
        reg.register(&constant("FOO", 43));

        assert_eq!(reg.registered().len(), 1);
        assert_eq!(reg.skipped(), &["FOO".to_string()]);
        // The first registration wins the index entry
        assert_eq!(reg.names_for(42), &["FOO".to_string()]);
        assert!(reg.names_for(43).is_empty());
    }

    #[test]
    fn test_constant_index_preserves_tie_order() {
        let mut reg = ScopeRegistry::new();
        reg.register(&constant("A", 1));
        reg.register(&constant("B", 1));
        reg.register(&constant("C", 2));

        assert_eq!(reg.names_for(1), &["A".to_string(), "B".to_string()]);
        assert_eq!(reg.names_for(2), &["C".to_string()]);
    }

    #[test]
    fn test_enum_members_indexed() {
        let mut reg = ScopeRegistry::new();
        reg.register(&Declaration::Enum(EnumDecl {
            name: "Color".into(),
            members: vec![
                EnumMember {
                    name: "RED".into(),
                    value: 0,
                },
                EnumMember {
                    name: "GREEN".into(),
                    value: 1,
                },
            ],
        }));

        assert_eq!(reg.names_for(0), &["RED".to_string()]);
        assert_eq!(reg.names_for(1), &["GREEN".to_string()]);
    }

    #[test]
    fn test_function_overload_allowed() {
        let mut reg = ScopeRegistry::new();
        let typed = |tys: &[&str]| {
            Declaration::Function(FunctionDecl {
                name: "abs".into(),
                return_type: CType::named("int"),
                params: tys
                    .iter()
                    .map(|t| ParamDecl {
                        name: String::new(),
                        ty: CType::named(*t),
                    })
                    .collect(),
                variadic: false,
                library: None,
            })
        };

        reg.register(&typed(&["int"]));
        reg.register(&typed(&["long"]));
        assert_eq!(reg.registered().len(), 2);
        assert!(reg.skipped().is_empty());
    }

    #[test]
    fn test_function_untyped_same_arity_conflicts() {
        let mut reg = ScopeRegistry::new();
        let untyped = Declaration::Function(FunctionDecl {
            name: "free".into(),
            return_type: CType::named("void"),
            params: vec![ParamDecl {
                name: "ptr".into(),
                ty: CType::named(""),
            }],
            variadic: false,
            library: None,
        });
        let typed = Declaration::Function(FunctionDecl {
            name: "free".into(),
            return_type: CType::named("void"),
            params: vec![ParamDecl {
                name: "ptr".into(),
                ty: CType::pointer("void", 1),
            }],
            variadic: false,
            library: None,
        });

        reg.register(&untyped);
        reg.register(&typed);
        assert_eq!(reg.registered().len(), 1);
        assert_eq!(reg.skipped(), &["free".to_string()]);
    }

    #[test]
    fn test_info_not_registered() {
        let mut reg = ScopeRegistry::new();
        reg.register(&Declaration::Info("skipped something".into()));
        assert!(reg.registered().is_empty());
        assert!(reg.skipped().is_empty());
    }
}
