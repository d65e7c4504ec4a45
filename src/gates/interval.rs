//! The multiple-interval-containment gate of Boyle et al.
//! (<https://eprint.iacr.org/2020/1392>, Fig. 14).
//!
//! The gate evaluates, under secret sharing, whether a masked input lies in
//! each of a fixed set of public intervals over the group `Z_N` with
//! `N = 2^log_group_size`. Inputs arrive masked by `r_in`; outputs are
//! additive shares of `r_out[i] + 1{p_i <= x <= q_i}`.

use crate::dcf::{dcf_key_party, DistributedComparisonFunction};
use crate::error::{Error, Result};
use crate::proto::{DcfParameters, DpfParameters, MicKey, MicParameters};
use crate::prng::{BasicRng, SecurePrng};
use crate::value::{integer_value_from_u128, integer_value_to_u128, DpfValue};

pub struct MultipleIntervalContainmentGate {
    parameters: MicParameters,
    // Interval bounds decoded once at construction.
    bounds: Vec<(u128, u128)>,
    dcf: DistributedComparisonFunction,
}

impl MultipleIntervalContainmentGate {
    pub fn create(parameters: MicParameters) -> Result<Self> {
        if parameters.log_group_size < 0 || parameters.log_group_size > 127 {
            return Err(Error::invalid_argument(
                "`log_group_size` must be between 0 and 127",
            ));
        }
        let group_size = 1u128 << parameters.log_group_size;
        let mut bounds = Vec::with_capacity(parameters.intervals.len());
        for interval in &parameters.intervals {
            let (lower, upper) = match (&interval.lower_bound, &interval.upper_bound) {
                (Some(lower), Some(upper)) => {
                    (integer_value_to_u128(lower)?, integer_value_to_u128(upper)?)
                }
                _ => return Err(Error::invalid_argument("intervals must be non-empty")),
            };
            if lower >= group_size || upper >= group_size {
                return Err(Error::invalid_argument(
                    "interval bounds must be between 0 and 2^log_group_size",
                ));
            }
            if lower > upper {
                return Err(Error::invalid_argument(
                    "interval upper bounds must be >= lower bounds",
                ));
            }
            bounds.push((lower, upper));
        }

        let dcf = DistributedComparisonFunction::create(DcfParameters {
            parameters: Some(DpfParameters {
                log_domain_size: parameters.log_group_size,
                value_type: Some(u128::value_type()),
                ..Default::default()
            }),
        })?;
        Ok(MultipleIntervalContainmentGate {
            parameters,
            bounds,
            dcf,
        })
    }

    pub fn parameters(&self) -> &MicParameters {
        &self.parameters
    }

    /// Generates a key pair for input mask `r_in` and per-interval output
    /// masks `r_out`.
    pub fn generate_keys(&self, r_in: u128, r_out: &[u128]) -> Result<(MicKey, MicKey)> {
        if r_out.len() != self.bounds.len() {
            return Err(Error::invalid_argument(
                "the number of output masks must equal the number of intervals",
            ));
        }
        let group_size = self.group_size();
        if r_in >= group_size {
            return Err(Error::invalid_argument(
                "the input mask must be between 0 and 2^log_group_size",
            ));
        }
        for &mask in r_out {
            if mask >= group_size {
                return Err(Error::invalid_argument(
                    "output masks must be between 0 and 2^log_group_size",
                ));
            }
        }

        // One DCF with threshold gamma = r_in - 1 serves all intervals.
        let gamma = (group_size - 1 + r_in) % group_size;
        let (dcf_key_0, dcf_key_1) = self.dcf.generate_keys(gamma, &1u128.to_value())?;
        let mut key_0 = MicKey {
            dcf_key: Some(dcf_key_0),
            ..Default::default()
        };
        let mut key_1 = MicKey {
            dcf_key: Some(dcf_key_1),
            ..Default::default()
        };

        let mut rng = BasicRng::new();
        for (&(lower, upper), &mask) in self.bounds.iter().zip(r_out) {
            let upper_next = (upper + 1) % group_size;
            let masked_lower = (lower + r_in) % group_size;
            let masked_upper = (upper + r_in) % group_size;
            let masked_upper_next = (upper + 1 + r_in) % group_size;

            // The correction term of the gate output; correctness follows
            // from Lemmas 1 and 2 of eprint 2020/1392. All arithmetic is mod
            // N, with 2^128 wraparound standing in for negative terms.
            let correction = mask
                .wrapping_add((masked_lower > masked_upper) as u128)
                .wrapping_sub((masked_lower > lower) as u128)
                .wrapping_add((masked_upper_next > upper_next) as u128)
                .wrapping_add((masked_upper == group_size - 1) as u128)
                % group_size;

            let share_0 = rng.rand128()? % group_size;
            let share_1 = correction.wrapping_sub(share_0) % group_size;
            key_0.output_mask_share.push(integer_value_from_u128(share_0));
            key_1.output_mask_share.push(integer_value_from_u128(share_1));
        }
        Ok((key_0, key_1))
    }

    /// Evaluates `keys[i]` at the masked input `evaluation_points[i]`,
    /// producing one output share per interval, grouped by key.
    pub fn batch_evaluate(
        &self,
        keys: &[MicKey],
        evaluation_points: &[u128],
    ) -> Result<Vec<u128>> {
        if keys.len() != evaluation_points.len() {
            return Err(Error::invalid_argument(
                "`keys` and `evaluation_points` must have the same size",
            ));
        }
        let group_size = self.group_size();
        for &x in evaluation_points {
            if x >= group_size {
                return Err(Error::invalid_argument(
                    "masked inputs must be between 0 and 2^log_group_size",
                ));
            }
        }
        let mut result = Vec::with_capacity(keys.len() * self.bounds.len());
        for (key, &x) in keys.iter().zip(evaluation_points) {
            if key.output_mask_share.len() != self.bounds.len() {
                return Err(Error::invalid_argument(
                    "key does not carry one output mask share per interval",
                ));
            }
            let dcf_key = key
                .dcf_key
                .as_ref()
                .ok_or_else(|| Error::invalid_argument("key must contain a DCF key"))?;
            let party = dcf_key_party(dcf_key)?;
            for (i, &(lower, upper)) in self.bounds.iter().enumerate() {
                let upper_next = (upper + 1) % group_size;
                let shifted_lower = (x + group_size - 1 - lower) % group_size;
                let shifted_upper_next = (x + group_size - 1 - upper_next) % group_size;

                let below_lower: u128 = self.dcf.evaluate(dcf_key, shifted_lower)?;
                let below_upper_next: u128 = self.dcf.evaluate(dcf_key, shifted_upper_next)?;
                let mask_share = integer_value_to_u128(&key.output_mask_share[i])?;

                let public_term = if party == 1 {
                    ((x > lower) as u128).wrapping_sub((x > upper_next) as u128)
                } else {
                    0
                };
                let output = public_term
                    .wrapping_sub(below_lower)
                    .wrapping_add(below_upper_next)
                    .wrapping_add(mask_share)
                    % group_size;
                result.push(output);
            }
        }
        Ok(result)
    }

    fn group_size(&self) -> u128 {
        1u128 << self.parameters.log_group_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Interval;
    use rand::{thread_rng, Rng};

    fn interval(lower: u128, upper: u128) -> Interval {
        Interval {
            lower_bound: Some(integer_value_from_u128(lower)),
            upper_bound: Some(integer_value_from_u128(upper)),
        }
    }

    fn gate(log_group_size: i32, intervals: Vec<Interval>) -> MultipleIntervalContainmentGate {
        MultipleIntervalContainmentGate::create(MicParameters {
            log_group_size,
            intervals,
        })
        .unwrap()
    }

    /// Runs the full masked protocol for one cleartext input.
    fn evaluate_cleartext(
        gate: &MultipleIntervalContainmentGate,
        r_in: u128,
        r_out: &[u128],
        x: u128,
    ) -> Vec<u128> {
        let group_size = 1u128 << gate.parameters().log_group_size;
        let keys = gate.generate_keys(r_in, r_out).unwrap();
        let masked = (x + r_in) % group_size;
        let shares_0 = gate.batch_evaluate(&[keys.0], &[masked]).unwrap();
        let shares_1 = gate.batch_evaluate(&[keys.1], &[masked]).unwrap();
        shares_0
            .into_iter()
            .zip(shares_1)
            .zip(r_out)
            .map(|((a, b), &mask)| a.wrapping_add(b).wrapping_sub(mask) % group_size)
            .collect()
    }

    #[test]
    fn containment_is_correct_over_the_whole_group() {
        let gate = gate(4, vec![interval(2, 6), interval(5, 5), interval(0, 15)]);
        let mut rng = thread_rng();
        for x in 0u128..16 {
            let r_in = rng.gen_range(0u128..16);
            let r_out: Vec<u128> = (0..3).map(|_| rng.gen_range(0u128..16)).collect();
            let outputs = evaluate_cleartext(&gate, r_in, &r_out, x);
            assert_eq!(outputs[0], (2..=6).contains(&x) as u128, "x = {}", x);
            assert_eq!(outputs[1], (x == 5) as u128, "x = {}", x);
            assert_eq!(outputs[2], 1, "x = {}", x);
        }
    }

    #[test]
    fn larger_group_spot_checks() {
        let gate = gate(16, vec![interval(1000, 2000)]);
        let mut rng = thread_rng();
        for _ in 0..10 {
            let x = rng.gen_range(0u128..1 << 16);
            let r_in = rng.gen_range(0u128..1 << 16);
            let outputs = evaluate_cleartext(&gate, r_in, &[0], x);
            assert_eq!(outputs[0], (1000..=2000).contains(&x) as u128, "x = {}", x);
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(MultipleIntervalContainmentGate::create(MicParameters {
            log_group_size: 128,
            intervals: vec![],
        })
        .is_err());
        assert!(MultipleIntervalContainmentGate::create(MicParameters {
            log_group_size: 4,
            intervals: vec![interval(7, 3)],
        })
        .is_err());
        assert!(MultipleIntervalContainmentGate::create(MicParameters {
            log_group_size: 4,
            intervals: vec![interval(1, 16)],
        })
        .is_err());
    }

    #[test]
    fn masks_must_be_group_elements() {
        let gate = gate(4, vec![interval(2, 6)]);
        assert!(gate.generate_keys(16, &[0]).is_err());
        assert!(gate.generate_keys(0, &[16]).is_err());
        assert!(gate.generate_keys(0, &[0, 0]).is_err());
        let keys = gate.generate_keys(0, &[0]).unwrap();
        assert!(gate.batch_evaluate(&[keys.0], &[16]).is_err());
    }
}
