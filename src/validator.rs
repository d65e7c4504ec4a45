//! Validation of parameters, keys, and evaluation contexts, and the mapping
//! between hierarchy levels and tree levels.

use crate::error::{Error, Result};
use crate::proto::{DpfKey, DpfParameters, EvaluationContext, ValueType};
use crate::value::{self, integer_type};

/// Largest admissible gap between the domain sizes of consecutive hierarchy
/// levels. Full expansion of a gap must fit in a signed 64-bit counter. A
/// larger jump can always be bridged by inserting intermediate levels.
const MAX_HIERARCHY_GAP: i32 = 62;

/// Resolves the value type of `parameters`, honoring the deprecated
/// `element_bitsize` field when `value_type` is absent.
pub(crate) fn effective_value_type(parameters: &DpfParameters) -> ValueType {
    match &parameters.value_type {
        Some(value_type) => value_type.clone(),
        None => integer_type(parameters.element_bitsize),
    }
}

fn parameters_are_equal(lhs: &DpfParameters, rhs: &DpfParameters) -> bool {
    lhs.log_domain_size == rhs.log_domain_size
        && value::value_types_are_equal(&effective_value_type(lhs), &effective_value_type(rhs))
}

/// Checks a parameter vector once at construction and owns the derived
/// hierarchy-to-tree-level maps, so the hot paths never re-derive them.
#[derive(Debug, Clone)]
pub(crate) struct ParameterValidator {
    parameters: Vec<DpfParameters>,
    value_types: Vec<ValueType>,
    value_bitsizes: Vec<usize>,
    log_domain_sizes: Vec<i32>,
    tree_levels_needed: usize,
    hierarchy_to_tree: Vec<usize>,
    tree_to_hierarchy: Vec<Option<usize>>,
}

impl ParameterValidator {
    pub(crate) fn new(parameters: &[DpfParameters]) -> Result<Self> {
        let (value_types, value_bitsizes) = Self::validate_parameters(parameters)?;
        let log_domain_sizes: Vec<i32> =
            parameters.iter().map(|p| p.log_domain_size).collect();

        // Assign each hierarchy level the tree depth at which its value
        // correction is applied. A 128-bit block holds 2^(7 - log2(bitsize))
        // elements, so packing shaves that many levels off the tree; the max
        // keeps assignments strictly increasing when small domains would
        // otherwise collide.
        let mut tree_levels_needed = 0usize;
        let mut hierarchy_to_tree = Vec::with_capacity(parameters.len());
        for (i, parameter) in parameters.iter().enumerate() {
            let log_element_size = value_bitsizes[i].next_power_of_two().trailing_zeros() as i64;
            if log_element_size > 7 {
                return Err(Error::invalid_argument(
                    "value types of size more than 128 bits are not supported",
                ));
            }
            let tree_level = (tree_levels_needed as i64)
                .max(parameter.log_domain_size as i64 - 7 + log_element_size)
                as usize;
            hierarchy_to_tree.push(tree_level);
            tree_levels_needed = tree_level + 1;
        }
        let mut tree_to_hierarchy = vec![None; tree_levels_needed];
        for (hierarchy, &tree) in hierarchy_to_tree.iter().enumerate() {
            tree_to_hierarchy[tree] = Some(hierarchy);
        }

        Ok(ParameterValidator {
            parameters: parameters.to_vec(),
            value_types,
            value_bitsizes,
            log_domain_sizes,
            tree_levels_needed,
            hierarchy_to_tree,
            tree_to_hierarchy,
        })
    }

    fn validate_parameters(
        parameters: &[DpfParameters],
    ) -> Result<(Vec<ValueType>, Vec<usize>)> {
        if parameters.is_empty() {
            return Err(Error::invalid_argument("`parameters` must not be empty"));
        }
        let mut value_types = Vec::with_capacity(parameters.len());
        let mut value_bitsizes = Vec::with_capacity(parameters.len());
        let mut previous_log_domain_size = 0;
        let mut previous_bitsize = 1;
        for (i, parameter) in parameters.iter().enumerate() {
            let log_domain_size = parameter.log_domain_size;
            if log_domain_size < 0 {
                return Err(Error::invalid_argument(
                    "`log_domain_size` must be non-negative",
                ));
            }
            if log_domain_size > 128 {
                return Err(Error::invalid_argument(
                    "`log_domain_size` must be at most 128",
                ));
            }
            if i > 0 && log_domain_size <= previous_log_domain_size {
                return Err(Error::invalid_argument(
                    "`log_domain_size` fields must be in ascending order in `parameters`",
                ));
            }
            if log_domain_size > previous_log_domain_size + MAX_HIERARCHY_GAP {
                return Err(Error::invalid_argument(format!(
                    "hierarchy levels may be at most {} apart",
                    MAX_HIERARCHY_GAP
                )));
            }
            previous_log_domain_size = log_domain_size;

            let value_type = effective_value_type(parameter);
            let bitsize = value::validate_value_type(&value_type)?;
            if bitsize < previous_bitsize {
                return Err(Error::invalid_argument(
                    "`value_type` fields must be of non-decreasing size in `parameters`",
                ));
            }
            previous_bitsize = bitsize;
            value_types.push(value_type);
            value_bitsizes.push(bitsize);
        }
        Ok((value_types, value_bitsizes))
    }

    /// Checks that `key` was generated for this parameter vector.
    pub(crate) fn validate_dpf_key(&self, key: &DpfKey) -> Result<()> {
        if key.seed.is_none() {
            return Err(Error::invalid_argument("key seed must be present"));
        }
        if key.party != 0 && key.party != 1 {
            return Err(Error::invalid_argument("key party must be 0 or 1"));
        }
        if key.last_level_value_correction.is_empty() {
            return Err(Error::invalid_argument(
                "key last_level_value_correction must be present",
            ));
        }
        if key.correction_words.len() != self.tree_levels_needed - 1 {
            return Err(Error::invalid_argument(format!(
                "malformed DpfKey: expected {} correction words, but got {}",
                self.tree_levels_needed - 1,
                key.correction_words.len()
            )));
        }
        for correction_word in &key.correction_words {
            if correction_word.seed.is_none() {
                return Err(Error::invalid_argument(
                    "malformed DpfKey: correction word seed must be present",
                ));
            }
        }
        for (hierarchy, &tree) in self.hierarchy_to_tree.iter().enumerate() {
            if tree == self.tree_levels_needed - 1 {
                // The deepest level's value correction lives in the key's
                // distinguished field.
                continue;
            }
            if key.correction_words[tree].value_correction.is_empty() {
                return Err(Error::invalid_argument(format!(
                    "malformed DpfKey: expected correction_words[{}] to contain the value \
                     correction of hierarchy level {}",
                    tree, hierarchy
                )));
            }
        }
        Ok(())
    }

    /// Checks that `ctx` belongs to this DPF and can accept another call.
    pub(crate) fn validate_evaluation_context(&self, ctx: &EvaluationContext) -> Result<()> {
        if ctx.parameters.len() != self.parameters.len() {
            return Err(Error::invalid_argument(
                "number of parameters in `ctx` doesn't match",
            ));
        }
        for (i, (expected, actual)) in
            self.parameters.iter().zip(&ctx.parameters).enumerate()
        {
            if !parameters_are_equal(expected, actual) {
                return Err(Error::invalid_argument(format!(
                    "parameter {} in `ctx` doesn't match",
                    i
                )));
            }
        }
        let key = ctx
            .key
            .as_ref()
            .ok_or_else(|| Error::invalid_argument("ctx.key must be present"))?;
        self.validate_dpf_key(key)?;
        if ctx.previous_hierarchy_level >= self.parameters.len() as i32 - 1 {
            return Err(Error::failed_precondition(
                "this context has already been fully evaluated",
            ));
        }
        if !ctx.partial_evaluations.is_empty()
            && (ctx.partial_evaluations_level < 0
                || ctx.partial_evaluations_level >= ctx.previous_hierarchy_level)
        {
            return Err(Error::invalid_argument(
                "ctx.partial_evaluations_level must be less than ctx.previous_hierarchy_level",
            ));
        }
        Ok(())
    }

    pub(crate) fn parameters(&self) -> &[DpfParameters] {
        &self.parameters
    }

    pub(crate) fn value_types(&self) -> &[ValueType] {
        &self.value_types
    }

    pub(crate) fn value_bitsizes(&self) -> &[usize] {
        &self.value_bitsizes
    }

    pub(crate) fn log_domain_sizes(&self) -> &[i32] {
        &self.log_domain_sizes
    }

    pub(crate) fn tree_levels_needed(&self) -> usize {
        self.tree_levels_needed
    }

    pub(crate) fn hierarchy_to_tree(&self) -> &[usize] {
        &self.hierarchy_to_tree
    }

    pub(crate) fn tree_to_hierarchy(&self) -> &[Option<usize>] {
        &self.tree_to_hierarchy
    }
}
