//! Distributed point functions and primitives built on them.
//!
//! A distributed point function (DPF) secret-shares a function that is
//! nonzero at a single point: [`DistributedPointFunction::generate_keys`]
//! takes `(alpha, beta)` and produces two keys whose evaluations at any `x`
//! sum to `beta` when `x == alpha` and to 0 otherwise, while each key on its
//! own is pseudorandom. *Incremental* DPFs extend this to a hierarchy of
//! nested domain sizes with a separate `beta` per level, evaluated either
//! point-wise ([`DistributedPointFunction::evaluate_at`]) or level by level
//! with work shared through an [`EvaluationContext`]
//! ([`DistributedPointFunction::evaluate_until`]).
//!
//! On top of the DPF engine, the crate provides distributed comparison
//! functions ([`DistributedComparisonFunction`], sharing `beta` on all
//! `x < alpha`), the multiple-interval-containment gate
//! ([`gates::MultipleIntervalContainmentGate`]), and a two-server private
//! information retrieval scheme ([`pir`]).
//!
//! Outputs are typed: any unsigned integer up to 128 bits, tuples of such
//! integers, integers modulo a constant ([`IntModN`]), and XOR-group
//! integers ([`XorWrapper`]) can serve as `beta`, via the [`DpfValue`]
//! trait. Keys and contexts are protobuf messages ([`proto`]) with stable
//! field numbers.
//!
//! An engine instance is immutable after the needed value types are
//! registered and can be shared freely across threads. Evaluation contexts
//! are single-writer scratch owned by the caller.

mod dcf;
mod dpf;
mod error;
pub mod gates;
pub mod pir;
mod prg;
mod prng;
pub mod proto;
mod validator;
pub mod value;

pub use dcf::{dcf_key_party, dcf_parameters, DistributedComparisonFunction};
pub use dpf::DistributedPointFunction;
pub use error::{Error, Result};
pub use prg::Aes128FixedKeyHash;
pub use prng::{BasicRng, SecurePrng};
pub use proto::{
    Block, CorrectionWord, DcfKey, DcfParameters, DpfKey, DpfParameters, EvaluationContext,
    PartialEvaluation, Value, ValueType,
};
pub use value::{DpfValue, IntModN, XorWrapper};
