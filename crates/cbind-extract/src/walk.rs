//! AST walking and filtering
//!
//! Enumerates top-level declarations of each preprocessed translation
//! unit in source order, applies include/exclude policy, assigns names
//! to anonymous constructs, and splits macros into direct and opaque
//! sets. One bad symbol never aborts the run.

use std::collections::HashSet;
use tracing::debug;
use tree_sitter::{Node, Parser as TsParser};

use cbind_core::{Declaration, Error, ExtractRequest, Result};

use crate::classify::{classify, tokenize, MacroClass};
use crate::synth;

/// Mutable state threaded through one pipeline run, owned solely by the
/// walker
#[derive(Debug, Default)]
pub struct WalkState {
    /// Names already emitted this run
    pub seen: HashSet<String>,
    /// Per-run counter for anonymous enumeration names
    pub anon_enum_counter: u32,
    /// Macro names deferred to the probe, in first-seen order
    pub opaque_macros: Vec<String>,
}

impl WalkState {
    /// Next generated name for an anonymous enumeration
    fn next_anon_enum(&mut self) -> String {
        self.anon_enum_counter += 1;
        format!("ANONYMOUS_ENUM_{}", self.anon_enum_counter)
    }
}

/// Walks parsed translation units and accumulates declarations
pub struct Walker<'a> {
    request: &'a ExtractRequest,
    parser: TsParser,
}

impl<'a> Walker<'a> {
    pub fn new(request: &'a ExtractRequest) -> Self {
        let mut parser = TsParser::new();
        parser
            .set_language(&tree_sitter_c::language())
            .expect("Failed to load C grammar");
        Self { request, parser }
    }

    /// Walk one translation unit, appending declarations in source order
    pub fn walk_unit(
        &mut self,
        source: &str,
        state: &mut WalkState,
        decls: &mut Vec<Declaration>,
    ) -> Result<()> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| Error::Parse("failed to parse translation unit".into()))?;

        let root = tree.root_node();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            self.visit_top(child, source, state, decls);
        }
        Ok(())
    }

    fn visit_top(
        &self,
        node: Node,
        source: &str,
        state: &mut WalkState,
        decls: &mut Vec<Declaration>,
    ) {
        match node.kind() {
            "preproc_def" => self.visit_macro(node, source, state, decls),
            // Complex function-like macros are never evaluated
            "preproc_function_def" => {}
            "type_definition" => self.visit_typedef(node, source, state, decls),
            "struct_specifier" | "union_specifier" => {
                self.visit_aggregate(node, source, None, state, decls);
            }
            "enum_specifier" => {
                self.visit_enum(node, source, None, state, decls);
            }
            "declaration" | "function_definition" => {
                self.visit_declaration(node, source, state, decls);
            }
            _ => {}
        }
    }

    /// Duplicate and exclude policy shared by non-enum declarations
    fn filtered(&self, name: &str, state: &WalkState) -> bool {
        if state.seen.contains(name) {
            debug!("{} already emitted, skipping", name);
            return true;
        }
        if self.request.is_excluded(name) {
            debug!("{} excluded by pattern", name);
            return true;
        }
        false
    }

    fn emit(
        &self,
        name: &str,
        result: Result<Declaration>,
        state: &mut WalkState,
        decls: &mut Vec<Declaration>,
    ) {
        match result {
            Ok(decl) => {
                state.seen.insert(name.to_string());
                decls.push(decl);
            }
            Err(err) => {
                // Implementation-reserved names are expected to fail
                if !self.request.is_reserved(name) {
                    decls.push(Declaration::Info(format!(
                        "could not synthesize {}: {}",
                        name, err
                    )));
                }
            }
        }
    }

    fn visit_macro(
        &self,
        node: Node,
        source: &str,
        state: &mut WalkState,
        decls: &mut Vec<Declaration>,
    ) {
        let Some(name) = child_text(node, "identifier", source) else {
            return;
        };
        if self.request.is_reserved(&name) {
            return;
        }
        if self.filtered(&name, state) {
            return;
        }

        let value = node
            .children(&mut node.walk())
            .find(|c| c.kind() == "preproc_arg")
            .map(|c| text(c, source))
            .unwrap_or_default();
        let value = value.trim();

        let mut tokens = vec![name.clone()];
        tokens.extend(tokenize(value));

        match classify(&tokens) {
            MacroClass::Skipped => {}
            MacroClass::Direct => {
                let constant = synth::direct_macro(&name, value, &tokens[1..]);
                state.seen.insert(name);
                decls.push(Declaration::Constant(constant));
            }
            MacroClass::Opaque => {
                if !state.opaque_macros.contains(&name) {
                    state.opaque_macros.push(name);
                }
            }
        }
    }

    fn visit_typedef(
        &self,
        node: Node,
        source: &str,
        state: &mut WalkState,
        decls: &mut Vec<Declaration>,
    ) {
        // A typedef carrying an aggregate or enum body defines that type
        // too; an anonymous body takes the typedef's name
        let mut cursor = node.walk();
        let specifier = node.children(&mut cursor).find(|c| {
            matches!(
                c.kind(),
                "struct_specifier" | "union_specifier" | "enum_specifier"
            ) && synth::has_body(*c)
        });

        let alias = match synth::alias_decl(node, source) {
            Ok(alias) => alias,
            Err(err) => {
                decls.push(Declaration::Info(format!(
                    "could not synthesize typedef: {}",
                    err
                )));
                return;
            }
        };

        if let Some(spec) = specifier {
            let own_name = synth::specifier_name(spec, source);
            if spec.kind() == "enum_specifier" {
                let forced = if own_name.is_empty() {
                    Some(alias.name.clone())
                } else {
                    None
                };
                self.visit_enum(spec, source, forced, state, decls);
            } else {
                let forced = if own_name.is_empty() {
                    Some(alias.name.clone())
                } else {
                    None
                };
                self.visit_aggregate(spec, source, forced.as_deref(), state, decls);
            }
            // The alias itself is redundant when it named the definition
            if own_name.is_empty() {
                return;
            }
        }

        let name = alias.name.clone();
        if self.filtered(&name, state) {
            return;
        }
        self.emit(&name, Ok(Declaration::Alias(alias)), state, decls);
    }

    fn visit_aggregate(
        &self,
        node: Node,
        source: &str,
        forced_name: Option<&str>,
        state: &mut WalkState,
        decls: &mut Vec<Declaration>,
    ) {
        if !synth::has_body(node) {
            // Bare forward reference, nothing to synthesize
            return;
        }
        let name = match forced_name {
            Some(forced) => forced.to_string(),
            None => synth::specifier_name(node, source),
        };
        if name.is_empty() {
            debug!("anonymous aggregate without a typedef name, skipping");
            return;
        }
        if self.filtered(&name, state) {
            return;
        }
        let result = synth::struct_decl(node, source, forced_name).map(Declaration::Type);
        self.emit(&name, result, state, decls);
    }

    /// Enumerations are never filtered by exclude patterns: their
    /// generated names may legitimately collide with them
    fn visit_enum(
        &self,
        node: Node,
        source: &str,
        forced_name: Option<String>,
        state: &mut WalkState,
        decls: &mut Vec<Declaration>,
    ) {
        if !synth::has_body(node) {
            return;
        }
        let mut name = match forced_name {
            Some(forced) => forced,
            None => synth::specifier_name(node, source),
        };
        if name.is_empty() {
            name = state.next_anon_enum();
        }
        if state.seen.contains(&name) {
            debug!("{} already emitted, skipping", name);
            return;
        }
        let result = synth::enum_decl(node, source, name.clone()).map(Declaration::Enum);
        self.emit(&name, result, state, decls);
    }

    fn visit_declaration(
        &self,
        node: Node,
        source: &str,
        state: &mut WalkState,
        decls: &mut Vec<Declaration>,
    ) {
        // `struct X { ... };` style definitions parse as declarations
        // wrapping a specifier with a body
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "struct_specifier" | "union_specifier" if synth::has_body(child) => {
                    self.visit_aggregate(child, source, None, state, decls);
                }
                "enum_specifier" if synth::has_body(child) => {
                    self.visit_enum(child, source, None, state, decls);
                }
                _ => {}
            }
        }

        if !has_descendant(node, "function_declarator") {
            // Plain variables have no host-representable declaration
            debug!("skipping non-function declaration");
            return;
        }

        match synth::function_decl(node, source, &self.request.library) {
            Ok(func) => {
                let name = func.name.clone();
                if self.filtered(&name, state) {
                    return;
                }
                self.emit(&name, Ok(Declaration::Function(func)), state, decls);
            }
            Err(err) => {
                decls.push(Declaration::Info(format!(
                    "could not synthesize function: {}",
                    err
                )));
            }
        }
    }
}

fn text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

fn child_text(node: Node, kind: &str, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let result = node
        .children(&mut cursor)
        .find(|c| c.kind() == kind)
        .map(|c| text(c, source));
    result
}

fn has_descendant(node: Node, kind: &str) -> bool {
    if node.kind() == kind {
        return true;
    }
    let mut cursor = node.walk();
    let result = node
        .children(&mut cursor)
        .any(|c| has_descendant(c, kind));
    result
}
