//! Validation orchestrator.
//!
//! Resolves the applicable rule chain for a field, runs the chain's
//! validators in parallel, combines their results and converts the
//! outcome into a record patch. The orchestrator never mutates state
//! itself — the caller decides whether the patch goes through the
//! buffered event path or a direct, awaited commit.

use crate::hooks::FormMeta;
use crate::rules::{MessageTable, Rule, RuleArgs, RuleSet, VALIDATOR_ERROR_RULE};
use formic_tree::{FieldRecord, FieldTree, RecordPatch};
use formic_types::{FieldPath, ValidationResult, Validity};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Options for validating one field.
pub struct ValidateOptions {
    /// The field to validate.
    pub path: FieldPath,
    /// Explicit rule chain; wins over rule-set lookup when present.
    pub chain: Option<Vec<Arc<dyn Rule>>>,
    /// Substitute record to validate instead of the committed one, e.g.
    /// to probe a value before it is committed.
    pub record: Option<FieldRecord>,
    /// Run the chain even when the record says it is unnecessary.
    pub force: bool,
    /// Emit the resulting patch on the buffered event path (default).
    pub should_update_fields: bool,
}

impl ValidateOptions {
    /// Default options for a field: not forced, state update emitted.
    #[must_use]
    pub fn field(path: impl Into<FieldPath>) -> Self {
        Self {
            path: path.into(),
            chain: None,
            record: None,
            force: false,
            should_update_fields: true,
        }
    }

    /// Builder: validate a substitute record.
    #[must_use]
    pub fn with_record(mut self, record: FieldRecord) -> Self {
        self.record = Some(record);
        self
    }

    /// Builder: force the chain to run.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Builder: supply an explicit chain.
    #[must_use]
    pub fn with_chain(mut self, chain: Vec<Arc<dyn Rule>>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Builder: keep the result out of the state tree.
    #[must_use]
    pub fn without_update(mut self) -> Self {
        self.should_update_fields = false;
        self
    }
}

/// Runs rule chains against field records.
pub struct Validator {
    rules: RuleSet,
    messages: MessageTable,
}

impl Validator {
    /// Creates a validator over a merged rule set and message table.
    #[must_use]
    pub fn new(rules: RuleSet, messages: MessageTable) -> Self {
        Self { rules, messages }
    }

    /// Validates one record against its chain.
    ///
    /// Returns the field's next record (patch applied over the current
    /// one — read-your-own-write for the caller) together with the patch
    /// itself. An empty patch means the run was skipped because the
    /// record did not need re-validation.
    pub async fn run(
        &self,
        record: &FieldRecord,
        fields: &FieldTree,
        form: &FormMeta,
        chain: Option<&[Arc<dyn Rule>]>,
        force: bool,
    ) -> (FieldRecord, RecordPatch) {
        if !force && !record.needs_validation() {
            debug!(path = %record.path, "validation skipped; value unchanged since last run");
            return (record.clone(), RecordPatch::default());
        }

        let chain: Vec<Arc<dyn Rule>> = match chain {
            Some(explicit) => explicit.to_vec(),
            None => self.rules.chain_for(&record.path),
        };

        let result: ValidationResult = if chain.is_empty() {
            // No applicable rules: the field is trivially valid.
            ValidationResult::valid()
        } else {
            let runs = chain.iter().map(|rule| async {
                let args = RuleArgs {
                    value: &record.value,
                    fields,
                    form,
                };
                match rule.check(args).await {
                    Ok(result) => result,
                    Err(error) => {
                        warn!(rule = %rule.id(), %error,
                            "validator rejected; recording synthetic rule");
                        ValidationResult::invalid([VALIDATOR_ERROR_RULE])
                    }
                }
            });
            join_all(runs).await.into_iter().collect()
        };

        let errors: Vec<String> = result
            .rejected_rules
            .iter()
            .map(|id| self.messages.resolve(id))
            .collect();
        let patch = RecordPatch::default()
            .with_validity(Validity::from_expected(result.expected))
            .with_errors(errors)
            .with_touched(record.touched || !result.expected);

        debug!(path = %record.path, expected = result.expected,
            rejected = result.rejected_rules.len(), "field validated");
        (record.applied(&patch), patch)
    }
}
