//! Declaration synthesis
//!
//! Converts AST nodes and macro tokens into the declaration model, and
//! generates zero-value default constructors for aggregate types.

use std::collections::{HashMap, HashSet};
use tracing::debug;
use tree_sitter::Node;

use cbind_core::{
    AliasDecl, CType, ConstValue, ConstantDecl, CtorDecl, Declaration, EnumDecl, EnumMember,
    Error, FunctionDecl, ParamDecl, Result, StructDecl, StructField, ZeroValue,
    DEFAULT_LIBRARY,
};

use crate::classify::parse_int;

fn node_text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

/// Info gathered from one declarator chain
#[derive(Debug, Default)]
struct DeclaratorInfo {
    name: String,
    pointer_depth: u32,
    array_len: Option<usize>,
    /// Present when the chain contains a function declarator
    params: Option<(Vec<ParamDecl>, bool)>,
}

fn unwrap_declarator(node: Node, source: &str, info: &mut DeclaratorInfo) {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" => {
            info.name = node_text(node, source);
        }
        "pointer_declarator" | "abstract_pointer_declarator" => {
            info.pointer_depth += 1;
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.is_named() {
                    unwrap_declarator(child, source, info);
                }
            }
        }
        "function_declarator" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "parameter_list" => {
                        info.params = Some(extract_params(child, source));
                    }
                    _ => {
                        if child.is_named() {
                            unwrap_declarator(child, source, info);
                        }
                    }
                }
            }
        }
        "array_declarator" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "number_literal" => {
                        info.array_len = parse_int(&node_text(child, source))
                            .and_then(|v| usize::try_from(v).ok());
                    }
                    _ => {
                        if child.is_named() {
                            unwrap_declarator(child, source, info);
                        }
                    }
                }
            }
        }
        "parenthesized_declarator" | "init_declarator" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.is_named() {
                    unwrap_declarator(child, source, info);
                }
            }
        }
        _ => {}
    }
}

/// Extract the base type from a declaration-like node's specifier children
fn base_type(node: Node, source: &str) -> Option<CType> {
    let mut ty: Option<CType> = None;
    let mut is_const = false;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "primitive_type" | "type_identifier" | "sized_type_specifier" => {
                if ty.is_none() {
                    ty = Some(CType::named(node_text(child, source)));
                }
            }
            "struct_specifier" | "union_specifier" | "enum_specifier" => {
                if ty.is_none() {
                    let kw = child.kind().trim_end_matches("_specifier");
                    let name = specifier_name(child, source);
                    ty = Some(CType::named(format!("{} {}", kw, name)));
                }
            }
            "type_qualifier" => {
                if node_text(child, source) == "const" {
                    is_const = true;
                }
            }
            _ => {}
        }
    }

    ty.map(|mut t| {
        t.is_const = is_const;
        t
    })
}

/// Name carried by a struct/union/enum specifier, empty for anonymous
pub fn specifier_name(node: Node, source: &str) -> String {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_identifier" {
            return node_text(child, source);
        }
    }
    String::new()
}

/// Whether a specifier carries a body (definition, not a bare reference)
pub fn has_body(node: Node) -> bool {
    let mut cursor = node.walk();
    let result = node
        .children(&mut cursor)
        .any(|c| matches!(c.kind(), "field_declaration_list" | "enumerator_list"));
    result
}

fn extract_params(node: Node, source: &str) -> (Vec<ParamDecl>, bool) {
    let mut params = Vec::new();
    let mut variadic = false;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "parameter_declaration" => {
                if let Some(param) = extract_param(child, source) {
                    params.push(param);
                }
            }
            "variadic_parameter" => {
                variadic = true;
            }
            _ => {}
        }
    }

    // A lone `void` parameter list means no parameters
    if params.len() == 1 && params[0].ty.name == "void" && !params[0].ty.is_pointer() {
        params.clear();
    }

    (params, variadic)
}

fn extract_param(node: Node, source: &str) -> Option<ParamDecl> {
    let mut ty = base_type(node, source)?;
    let mut info = DeclaratorInfo::default();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        // A plain parameter's declarator is a bare identifier
        if child.kind().ends_with("declarator") || child.kind() == "identifier" {
            unwrap_declarator(child, source, &mut info);
        }
    }

    ty.pointer_depth = info.pointer_depth;
    ty.array_len = info.array_len;
    Some(ParamDecl {
        name: info.name,
        ty,
    })
}

/// Synthesize a struct or union definition
///
/// `forced_name` overrides an anonymous specifier's name, used for
/// `typedef struct { ... } Name;` constructs.
pub fn struct_decl(node: Node, source: &str, forced_name: Option<&str>) -> Result<StructDecl> {
    let own_name = specifier_name(node, source);
    let name = match forced_name {
        Some(forced) if own_name.is_empty() => forced.to_string(),
        _ => own_name,
    };
    if name.is_empty() {
        return Err(Error::Parse("anonymous aggregate without a name".into()));
    }

    let mut fields = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "field_declaration_list" {
            let mut list_cursor = child.walk();
            for field_node in child.children(&mut list_cursor) {
                if field_node.kind() == "field_declaration" {
                    extract_fields(field_node, source, &mut fields)?;
                }
            }
        }
    }

    Ok(StructDecl {
        name,
        is_union: node.kind() == "union_specifier",
        fields,
    })
}

/// One field_declaration may declare several fields (`int x, y;`)
fn extract_fields(node: Node, source: &str, fields: &mut Vec<StructField>) -> Result<()> {
    let base = base_type(node, source)
        .ok_or_else(|| Error::Parse("field without a type".into()))?;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind().ends_with("declarator") || child.kind() == "field_identifier" {
            let mut info = DeclaratorInfo::default();
            unwrap_declarator(child, source, &mut info);
            if info.name.is_empty() {
                continue;
            }
            let mut ty = base.clone();
            ty.pointer_depth = info.pointer_depth;
            ty.array_len = info.array_len;
            // Function-pointer fields carry their pointee as an opaque
            // pointer; the signature is not representable as a field type
            if info.params.is_some() && ty.pointer_depth == 0 {
                ty.pointer_depth = 1;
            }
            fields.push(StructField {
                name: info.name,
                ty,
            });
        }
    }

    Ok(())
}

/// Synthesize an enumeration with resolved member values
///
/// Members without an explicit value continue from the previous value,
/// starting at zero.
pub fn enum_decl(node: Node, source: &str, name: String) -> Result<EnumDecl> {
    let mut members = Vec::new();
    let mut next_value: i64 = 0;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "enumerator_list" {
            continue;
        }
        let mut list_cursor = child.walk();
        for item in child.children(&mut list_cursor) {
            if item.kind() != "enumerator" {
                continue;
            }
            let mut member_name = String::new();
            let mut value: Option<i64> = None;

            let mut item_cursor = item.walk();
            for part in item.children(&mut item_cursor) {
                match part.kind() {
                    "identifier" => {
                        if member_name.is_empty() {
                            member_name = node_text(part, source);
                        }
                    }
                    "number_literal" => {
                        value = parse_int(&node_text(part, source));
                    }
                    "unary_expression" | "binary_expression" | "char_literal" => {
                        let text = node_text(part, source);
                        value = parse_int(&text);
                        if value.is_none() {
                            return Err(Error::Parse(format!(
                                "unsupported enumerator value for {}: {}",
                                member_name, text
                            )));
                        }
                    }
                    _ => {}
                }
            }

            if member_name.is_empty() {
                continue;
            }
            let resolved = value.unwrap_or(next_value);
            next_value = resolved + 1;
            members.push(EnumMember {
                name: member_name,
                value: resolved,
            });
        }
    }

    Ok(EnumDecl { name, members })
}

/// Synthesize a function signature from a prototype or definition node
pub fn function_decl(node: Node, source: &str, library: &str) -> Result<FunctionDecl> {
    let return_base = base_type(node, source)
        .ok_or_else(|| Error::Parse("function without a return type".into()))?;

    let mut info = DeclaratorInfo::default();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind().ends_with("declarator") {
            unwrap_declarator(child, source, &mut info);
        }
    }

    let (params, variadic) = info
        .params
        .ok_or_else(|| Error::Parse("declaration has no parameter list".into()))?;
    if info.name.is_empty() {
        return Err(Error::Parse("function without a name".into()));
    }

    let mut return_type = return_base;
    return_type.pointer_depth = info.pointer_depth;

    Ok(FunctionDecl {
        name: info.name,
        return_type,
        params,
        variadic,
        library: Some(library.to_string()),
    })
}

/// Synthesize a typedef: alias to an existing type, or a definition of
/// the aliased aggregate/enum when the typedef carries a body
pub fn alias_decl(node: Node, source: &str) -> Result<AliasDecl> {
    let base = base_type(node, source)
        .ok_or_else(|| Error::Parse("typedef without a type".into()))?;

    let mut info = DeclaratorInfo::default();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind().ends_with("declarator") || child.kind() == "type_identifier" {
            // The last declarator child names the alias
            let mut candidate = DeclaratorInfo::default();
            unwrap_declarator(child, source, &mut candidate);
            if !candidate.name.is_empty() && candidate.name != base.name {
                info = candidate;
            }
        }
    }

    if info.name.is_empty() {
        return Err(Error::Parse("typedef without a name".into()));
    }

    let mut target = base;
    target.pointer_depth = info.pointer_depth;
    target.array_len = info.array_len;

    Ok(AliasDecl {
        name: info.name,
        target,
    })
}

/// Convert a direct macro's token stream into a constant
///
/// Single literal tokens become typed literals; anything else passes
/// through as an expression.
pub fn direct_macro(name: &str, value_text: &str, tokens: &[String]) -> ConstantDecl {
    let value = if tokens.len() == 1 {
        let token = &tokens[0];
        if let Some(v) = parse_int(token) {
            ConstValue::Int(v)
        } else if token.starts_with('"') && token.ends_with('"') && token.len() >= 2 {
            ConstValue::Str(unescape(&token[1..token.len() - 1]))
        } else if token.starts_with('\'') && token.ends_with('\'') && token.len() >= 3 {
            let inner = unescape(&token[1..token.len() - 1]);
            match inner.chars().next() {
                Some(c) if inner.chars().count() == 1 => ConstValue::Char(c),
                _ => ConstValue::Expr(token.clone()),
            }
        } else {
            ConstValue::Expr(token.clone())
        }
    } else if let Some(v) = parse_int(value_text.trim()) {
        ConstValue::Int(v)
    } else {
        ConstValue::Expr(value_text.trim().to_string())
    };

    ConstantDecl {
        name: name.to_string(),
        value,
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Finalize the merged declaration list
///
/// Rewrites default-library function bindings to bare symbol references
/// and appends zero-constructors immediately after each aggregate type.
pub fn finalize(decls: Vec<Declaration>) -> Vec<Declaration> {
    let structs: HashMap<String, StructDecl> = decls
        .iter()
        .filter_map(|d| match d {
            Declaration::Type(s) => Some((s.name.clone(), s.clone())),
            _ => None,
        })
        .collect();
    let aliases: HashMap<String, CType> = decls
        .iter()
        .filter_map(|d| match d {
            Declaration::Alias(a) => Some((a.name.clone(), a.target.clone())),
            _ => None,
        })
        .collect();

    let mut out = Vec::with_capacity(decls.len());
    for decl in decls {
        match decl {
            Declaration::Function(mut f) => {
                // Built-in functions resolve without qualification
                if f.library.as_deref() == Some(DEFAULT_LIBRARY) {
                    f.library = None;
                }
                out.push(Declaration::Function(f));
            }
            Declaration::Type(s) => {
                let ctors = zero_ctors(&s, &structs, &aliases);
                out.push(Declaration::Type(s));
                out.extend(ctors);
            }
            other => out.push(other),
        }
    }
    out
}

/// Generate the zero-constructor declarations for one aggregate:
/// an immutable variant and a mutable variant
pub fn zero_ctors(
    decl: &StructDecl,
    structs: &HashMap<String, StructDecl>,
    aliases: &HashMap<String, CType>,
) -> Vec<Declaration> {
    let fields: Vec<ZeroValue> = decl
        .fields
        .iter()
        .map(|f| zero_value(&f.ty, structs, aliases))
        .collect();

    [false, true]
        .into_iter()
        .map(|mutable| {
            Declaration::Ctor(CtorDecl {
                type_name: decl.name.clone(),
                mutable,
                fields: fields.clone(),
            })
        })
        .collect()
}

/// Recursively computed zero value for a field type
///
/// Pointers are scalar nulls; fixed arrays repeat the element zero;
/// embedded aggregates known to the run apply their own constructor to
/// their field zeros. Terminates for any acyclic aggregate.
pub fn zero_value(
    ty: &CType,
    structs: &HashMap<String, StructDecl>,
    aliases: &HashMap<String, CType>,
) -> ZeroValue {
    if ty.is_pointer() {
        return ZeroValue::Scalar("null".into());
    }
    if let Some(len) = ty.array_len {
        let mut elem_ty = ty.clone();
        elem_ty.array_len = None;
        return ZeroValue::Array {
            elem: Box::new(zero_value(&elem_ty, structs, aliases)),
            len,
        };
    }

    // Resolve through typedef aliases, guarding against alias cycles
    let mut name = ty.name.as_str();
    let mut visited = HashSet::new();
    while let Some(target) = aliases.get(name) {
        if !visited.insert(name) {
            break;
        }
        if target.is_pointer() {
            return ZeroValue::Scalar("null".into());
        }
        if let Some(len) = target.array_len {
            let mut elem_ty = target.clone();
            elem_ty.array_len = None;
            return ZeroValue::Array {
                elem: Box::new(zero_value(&elem_ty, structs, aliases)),
                len,
            };
        }
        name = target.name.as_str();
    }

    let bare = name
        .trim_start_matches("struct ")
        .trim_start_matches("union ");
    if let Some(inner) = structs.get(bare) {
        return ZeroValue::Aggregate {
            type_name: inner.name.clone(),
            fields: inner
                .fields
                .iter()
                .map(|f| zero_value(&f.ty, structs, aliases))
                .collect(),
        };
    }

    if name.starts_with("enum ") {
        return ZeroValue::Scalar("0".into());
    }
    match name {
        "float" | "double" | "long double" => ZeroValue::Scalar("0.0".into()),
        other => {
            if other.starts_with("struct ") || other.starts_with("union ") {
                debug!("unknown embedded aggregate {}, using scalar zero", other);
            }
            ZeroValue::Scalar("0".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_direct_macro_literals() {
        let int = direct_macro("FOO", "42", &["42".into()]);
        assert_eq!(int.value, ConstValue::Int(42));

        let string = direct_macro("BAR", "\"hi\"", &["\"hi\"".into()]);
        assert_eq!(string.value, ConstValue::Str("hi".into()));

        let ch = direct_macro("NL", "'\\n'", &["'\\n'".into()]);
        assert_eq!(ch.value, ConstValue::Char('\n'));

        let expr = direct_macro("SUM", "1 + 2", &["1".into(), "+".into(), "2".into()]);
        assert_eq!(expr.value, ConstValue::Expr("1 + 2".into()));
    }

    #[test]
    fn test_direct_macro_negative_int() {
        let neg = direct_macro("NEG", "-1", &["-".into(), "1".into()]);
        assert_eq!(neg.value, ConstValue::Int(-1));
    }

    #[test]
    fn test_zero_value_scalars() {
        let structs = HashMap::new();
        let aliases = HashMap::new();

        assert_eq!(
            zero_value(&CType::named("int"), &structs, &aliases),
            ZeroValue::Scalar("0".into())
        );
        assert_eq!(
            zero_value(&CType::named("double"), &structs, &aliases),
            ZeroValue::Scalar("0.0".into())
        );
        assert_eq!(
            zero_value(&CType::pointer("char", 1), &structs, &aliases),
            ZeroValue::Scalar("null".into())
        );
    }

    #[test]
    fn test_zero_value_array() {
        let structs = HashMap::new();
        let aliases = HashMap::new();
        let mut ty = CType::named("int");
        ty.array_len = Some(3);

        assert_eq!(
            zero_value(&ty, &structs, &aliases),
            ZeroValue::Array {
                elem: Box::new(ZeroValue::Scalar("0".into())),
                len: 3,
            }
        );
    }

    #[test]
    fn test_zero_value_nested_aggregate() {
        let inner = StructDecl {
            name: "Point".into(),
            is_union: false,
            fields: vec![
                StructField {
                    name: "x".into(),
                    ty: CType::named("int"),
                },
                StructField {
                    name: "y".into(),
                    ty: CType::named("int"),
                },
            ],
        };
        let mut structs = HashMap::new();
        structs.insert("Point".into(), inner);
        let aliases = HashMap::new();

        let zero = zero_value(&CType::named("struct Point"), &structs, &aliases);
        assert_eq!(
            zero,
            ZeroValue::Aggregate {
                type_name: "Point".into(),
                fields: vec![ZeroValue::Scalar("0".into()), ZeroValue::Scalar("0".into())],
            }
        );
    }

    #[test]
    fn test_zero_value_alias_resolution() {
        let structs = HashMap::new();
        let mut aliases = HashMap::new();
        aliases.insert("my_float".to_string(), CType::named("double"));
        aliases.insert("my_handle".to_string(), CType::pointer("void", 1));

        assert_eq!(
            zero_value(&CType::named("my_float"), &structs, &aliases),
            ZeroValue::Scalar("0.0".into())
        );
        assert_eq!(
            zero_value(&CType::named("my_handle"), &structs, &aliases),
            ZeroValue::Scalar("null".into())
        );
    }

    #[test]
    fn test_zero_value_alias_cycle_terminates() {
        let structs = HashMap::new();
        let mut aliases = HashMap::new();
        aliases.insert("a".to_string(), CType::named("b"));
        aliases.insert("b".to_string(), CType::named("a"));

        // Must not loop forever; degrades to a scalar zero
        assert_eq!(
            zero_value(&CType::named("a"), &structs, &aliases),
            ZeroValue::Scalar("0".into())
        );
    }

    #[test]
    fn test_finalize_rewrites_default_library() {
        let func = |lib: &str| {
            Declaration::Function(FunctionDecl {
                name: "f".into(),
                return_type: CType::named("int"),
                params: vec![],
                variadic: false,
                library: Some(lib.to_string()),
            })
        };

        let out = finalize(vec![func(DEFAULT_LIBRARY), func("libm")]);
        match (&out[0], &out[1]) {
            (Declaration::Function(a), Declaration::Function(b)) => {
                assert_eq!(a.library, None);
                assert_eq!(b.library, Some("libm".to_string()));
            }
            _ => panic!("expected two functions"),
        }
    }

    #[test]
    fn test_finalize_appends_ctors_after_type() {
        let point = Declaration::Type(StructDecl {
            name: "Point".into(),
            is_union: false,
            fields: vec![StructField {
                name: "x".into(),
                ty: CType::named("int"),
            }],
        });
        let marker = Declaration::Constant(ConstantDecl {
            name: "AFTER".into(),
            value: ConstValue::Int(1),
        });

        let out = finalize(vec![point, marker]);
        assert_eq!(out.len(), 4);
        assert!(matches!(&out[0], Declaration::Type(_)));
        assert!(
            matches!(&out[1], Declaration::Ctor(c) if !c.mutable && c.type_name == "Point")
        );
        assert!(matches!(&out[2], Declaration::Ctor(c) if c.mutable));
        assert!(matches!(&out[3], Declaration::Constant(_)));
    }
}
