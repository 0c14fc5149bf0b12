//! # Insert Pipeline
//!
//! One insert runs Scanner → rule lookup → Argument Interpreter → size
//! resolution → scaling → Structural Patcher. The result is an [`Edit`]
//! computed entirely in memory; the document is touched only when the caller
//! applies it.

use crate::args::{self, CollectionKind};
use crate::document::{Position, TextBuffer};
use crate::error::InsertError;
use crate::patch::{self, PropEdit, Replacement};
use crate::resolver::SizeResolver;
use crate::rules::{self, DataSource, Lookup, OptionsKeys, Rule, RuleRegistry};
use crate::scale::{Mode, scale};
use crate::scanner;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct InsertRequest {
    pub cursor: Position,
    pub mode: Mode,
    pub overwrite: bool,
    /// Call names to look for beyond those with a rule.
    pub extra_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditRange {
    pub start: Position,
    pub end: Position,
}

/// Replacement of a call's argument text, parentheses excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub name: String,
    pub range: EditRange,
    pub new_text: String,
}

/// Computes the edit for the call under `request.cursor`.
pub fn plan_insert(
    buffer: &TextBuffer,
    request: &InsertRequest,
    registry: &RuleRegistry,
    resolver: &mut dyn SizeResolver,
) -> Result<Edit, InsertError> {
    let mut names = registry.candidate_names();
    for extra in &request.extra_names {
        let name = rules::normalize_name(extra);
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }

    let call = scanner::locate(buffer, request.cursor, &names).ok_or(InsertError::NotFound)?;

    let rule = match registry.lookup(&call.name) {
        Lookup::Rule(rule) => rule,
        Lookup::Unsupported(unsupported) => {
            return Err(InsertError::UnsupportedShape {
                name: call.name,
                kind: unsupported.kind.clone(),
            });
        }
        Lookup::Unknown => return Err(InsertError::UnknownRule { name: call.name }),
    };
    info!(name = %call.name, kind = rule.kind(), "matched rule");

    let new_text = match rule {
        Rule::Positional { .. } => insert_positional(&call.args_text, request, resolver)?,
        Rule::OptionsObject { keys, .. } => {
            insert_options_object(&call.args_text, keys, request, resolver)?
        }
        Rule::DataCollection { sources, .. } => {
            insert_data_collection(&call.args_text, sources, request, resolver)?
        }
    };

    let (start, end) = call.args_range();
    Ok(Edit {
        name: call.name,
        range: EditRange { start, end },
        new_text,
    })
}

/// Applies an edit produced by [`plan_insert`] for the same buffer.
pub fn apply(buffer: &mut TextBuffer, edit: &Edit) -> anyhow::Result<()> {
    buffer.replace(edit.range.start, edit.range.end, &edit.new_text)
}

fn insert_positional(
    args_text: &str,
    request: &InsertRequest,
    resolver: &mut dyn SizeResolver,
) -> Result<String, InsertError> {
    let parsed = args::parse_positional(args_text)?;
    debug!(file = %parsed.file, arg_count = parsed.arg_count, "positional arguments");

    let size = resolver.resolve(&parsed.file)?;
    let scaled = scale(size.width, size.height, request.mode);
    Ok(patch::patch_positional(
        args_text,
        &parsed.args,
        scaled,
        request.overwrite,
    ))
}

fn insert_options_object(
    args_text: &str,
    keys: &OptionsKeys,
    request: &InsertRequest,
    resolver: &mut dyn SizeResolver,
) -> Result<String, InsertError> {
    let parsed = args::parse_options_object(args_text, keys)?;
    debug!(
        pc = ?parsed.pc,
        sp = ?parsed.sp,
        has_width = parsed.has_width,
        has_height = parsed.has_height,
        has_width_sp = parsed.has_width_sp,
        has_height_sp = parsed.has_height_sp,
        "options object"
    );

    let mut edits = Vec::new();
    let roles = [
        (&parsed.pc, &keys.pc_width, &keys.pc_height),
        (&parsed.sp, &keys.sp_width, &keys.sp_height),
    ];
    for (image, width_key, height_key) in roles {
        let Some(image) = image else {
            continue;
        };
        let size = resolver.resolve(image)?;
        let scaled = scale(size.width, size.height, request.mode);
        edits.push(PropEdit::new(width_key, scaled.width));
        edits.push(PropEdit::new(height_key, scaled.height));
    }

    let obj_src = &args_text[parsed.obj_span.clone()];
    let new_obj = patch::patch_object(obj_src, &edits, request.overwrite);
    Ok(patch::apply_descending(
        args_text,
        vec![Replacement::new(parsed.obj_span, new_obj)],
    ))
}

fn insert_data_collection(
    args_text: &str,
    sources: &[DataSource],
    request: &InsertRequest,
    resolver: &mut dyn SizeResolver,
) -> Result<String, InsertError> {
    let mut parsed = args::parse_data_collection(args_text, sources)?;
    if parsed.kind == CollectionKind::Object {
        debug!("data collection is a single object");
    }

    // Last item first, matching the order the replacements are applied in.
    parsed
        .items
        .sort_by(|a, b| b.span.start.cmp(&a.span.start));

    let mut replacements = Vec::with_capacity(parsed.items.len());
    for item in &parsed.items {
        let mut edits = Vec::new();
        for source in &item.sources {
            let size = resolver.resolve(&source.image)?;
            let scaled = scale(size.width, size.height, request.mode);
            edits.push(PropEdit::new(&source.width_key, scaled.width));
            edits.push(PropEdit::new(&source.height_key, scaled.height));
        }
        let obj_src = &args_text[item.span.clone()];
        replacements.push(Replacement::new(
            item.span.clone(),
            patch::patch_object(obj_src, &edits, request.overwrite),
        ));
    }

    info!(items = replacements.len(), "patched data items");
    Ok(patch::apply_descending(args_text, replacements))
}
