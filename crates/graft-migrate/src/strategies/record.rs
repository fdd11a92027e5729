//! Field-by-field record migration
//!
//! Fallback for every record type no container strategy claims. The new
//! instance takes each field from the old field of the same name, or of a
//! former name; fields that did not exist before keep their default.

use crate::context::MigrationContext;
use crate::error::{DiagnosticKind, MigrationResult};
use crate::path::PathSegment;
use crate::strategy::{Allocation, MigrationStrategy, MigrationTask};
use graft_heap::{ObjectId, TypeDescriptor, TypeId, TypeKind, TypeRegistry, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Where a new field's value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSource {
    /// Old field at this position
    Old(usize),
    /// Field is new; use this value
    Default(Value),
}

/// One field of the new layout
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedField {
    /// Field name in the new layout
    pub name: String,
    /// Declared type in the new layout
    pub ty: TypeId,
    /// Value source
    pub source: FieldSource,
    /// Keyed containers held here may keep null keys
    pub null_keys_expected: bool,
}

/// Old layout → new layout field mapping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldPlan {
    /// New fields in layout order
    pub fields: Vec<PlannedField>,
    /// Old fields with no counterpart, which are dropped
    pub dropped: Vec<String>,
}

impl FieldPlan {
    /// Match the fields of `new` against `old`
    ///
    /// An exact name match wins over a former-name alias.
    #[must_use]
    pub fn build(types: &TypeRegistry, old: &TypeDescriptor, new: &TypeDescriptor) -> Self {
        let old_fields = old.fields();
        let fields: Vec<PlannedField> = new
            .fields()
            .iter()
            .map(|field| {
                let source = old_fields
                    .iter()
                    .position(|f| f.name == field.name)
                    .or_else(|| old_fields.iter().position(|f| field.answers_to(&f.name)))
                    .map_or_else(
                        || FieldSource::Default(Value::default_for(types, field.ty)),
                        FieldSource::Old,
                    );
                PlannedField {
                    name: field.name.clone(),
                    ty: field.ty,
                    source,
                    null_keys_expected: field.null_keys_expected,
                }
            })
            .collect();
        let dropped = old_fields
            .iter()
            .enumerate()
            .filter(|(i, _)| !fields.iter().any(|f| f.source == FieldSource::Old(*i)))
            .map(|(_, f)| f.name.clone())
            .collect();
        Self { fields, dropped }
    }
}

/// Generic per-field strategy for records
#[derive(Debug, Default)]
pub struct RecordStrategy {
    plans: Mutex<HashMap<(TypeId, TypeId), Arc<FieldPlan>>>,
}

impl RecordStrategy {
    /// Create new record strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of field plans built this pass
    #[must_use]
    pub fn cached_plans(&self) -> usize {
        self.plans.lock().len()
    }

    fn plan(&self, cx: &MigrationContext<'_>, old: TypeId, new: TypeId) -> MigrationResult<Arc<FieldPlan>> {
        if let Some(plan) = self.plans.lock().get(&(old, new)) {
            return Ok(Arc::clone(plan));
        }
        let plan = Arc::new(FieldPlan::build(
            cx.types(),
            cx.descriptor(old)?,
            cx.descriptor(new)?,
        ));
        if !plan.dropped.is_empty() {
            tracing::debug!(
                from = %cx.types().name_of(old),
                dropped = ?plan.dropped,
                "fields removed from layout"
            );
        }
        self.plans.lock().insert((old, new), Arc::clone(&plan));
        Ok(plan)
    }
}

impl MigrationStrategy for RecordStrategy {
    fn name(&self) -> &'static str {
        "record"
    }

    fn should_handle(&self, ty: &TypeDescriptor) -> bool {
        matches!(ty.kind, TypeKind::Record { .. })
    }

    fn create_empty(
        &self,
        cx: &mut MigrationContext<'_>,
        old: ObjectId,
        in_place: bool,
    ) -> MigrationResult<Allocation> {
        if in_place {
            return cx.reuse_in_place(old);
        }
        cx.allocate_successor(old, |kind| matches!(kind, TypeKind::Record { .. }))
    }

    fn populate(&self, cx: &mut MigrationContext<'_>, task: &MigrationTask) -> MigrationResult<usize> {
        let new_type = cx.heap().type_of(task.new)?;
        let plan = self.plan(cx, task.old_type, new_type)?;
        let old_values = cx.heap().record_fields(task.old)?.to_vec();

        let mut values = Vec::with_capacity(plan.fields.len());
        for field in &plan.fields {
            let value = match &field.source {
                FieldSource::Default(value) => value.clone(),
                FieldSource::Old(index) => {
                    let old_value = old_values.get(*index).cloned().unwrap_or(Value::Null);
                    cx.traced(PathSegment::Field(field.name.clone()), |cx| {
                        migrate_field(cx, field, &old_value)
                    })?
                }
            };
            values.push(value);
        }

        let count = values.len();
        cx.heap_mut().set_record_fields(task.new, values)?;
        Ok(count)
    }

    fn on_pass_start(&self) {
        self.plans.lock().clear();
    }
}

fn migrate_field(
    cx: &mut MigrationContext<'_>,
    field: &PlannedField,
    old_value: &Value,
) -> MigrationResult<Value> {
    if field.null_keys_expected {
        if let Some(container) = old_value.as_object() {
            cx.tolerate_null_keys(container);
        }
    }
    let upgraded = cx.upgrade_or_null(old_value)?;
    let slot = format!("field '{}'", field.name);
    Ok(cx.fit(field.ty, upgraded, DiagnosticKind::FieldTypeChanged, &slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_heap::FieldDef;
    use pretty_assertions::assert_eq;

    fn layouts() -> (TypeRegistry, TypeId, TypeId) {
        let mut types = TypeRegistry::new();
        let old = types
            .register(TypeDescriptor::record(
                "Player",
                1,
                vec![
                    FieldDef::new("id", TypeId::INT),
                    FieldDef::new("name", TypeId::STR),
                    FieldDef::new("legacy", TypeId::BOOL),
                ],
            ))
            .unwrap();
        let new = types
            .register(TypeDescriptor::record(
                "Player",
                2,
                vec![
                    FieldDef::new("name", TypeId::STR),
                    FieldDef::new("ident", TypeId::INT).renamed_from("id"),
                    FieldDef::new("score", TypeId::INT),
                ],
            ))
            .unwrap();
        (types, old, new)
    }

    #[test]
    fn plan_matches_names_and_aliases() {
        let (types, old, new) = layouts();
        let plan = FieldPlan::build(&types, types.get(old).unwrap(), types.get(new).unwrap());
        let sources: Vec<_> = plan.fields.iter().map(|f| f.source.clone()).collect();
        assert_eq!(
            sources,
            vec![
                FieldSource::Old(1),
                FieldSource::Old(0),
                FieldSource::Default(Value::Int(0)),
            ]
        );
        assert_eq!(plan.dropped, vec!["legacy".to_string()]);
    }

    #[test]
    fn exact_name_beats_alias() {
        let mut types = TypeRegistry::new();
        let old = TypeDescriptor::record(
            "R",
            1,
            vec![FieldDef::new("a", TypeId::INT), FieldDef::new("b", TypeId::INT)],
        );
        let new = TypeDescriptor::record("R", 2, vec![FieldDef::new("b", TypeId::INT).renamed_from("a")]);
        types.register(old.clone()).unwrap();
        let plan = FieldPlan::build(&types, &old, &new);
        assert_eq!(plan.fields[0].source, FieldSource::Old(1));
    }

    #[test]
    fn pass_start_clears_plans() {
        let strategy = RecordStrategy::new();
        strategy
            .plans
            .lock()
            .insert((TypeId(10), TypeId(11)), Arc::new(FieldPlan::default()));
        assert_eq!(strategy.cached_plans(), 1);
        strategy.on_pass_start();
        assert_eq!(strategy.cached_plans(), 0);
    }
}
