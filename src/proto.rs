//! Wire messages for keys, parameters and evaluation contexts.
//!
//! These structs are kept in the exact shape emitted by `prost-build` for the
//! corresponding protobuf schema, with the field tags spelled out on every
//! field. The tags are part of the public contract: keys serialized by one
//! party must decode on the other side of the network, possibly years later,
//! so they must never be renumbered.

/// A 128-bit value, split into two 64-bit halves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Block {
    #[prost(uint64, tag = "1")]
    pub high: u64,
    #[prost(uint64, tag = "2")]
    pub low: u64,
}

impl From<u128> for Block {
    fn from(value: u128) -> Self {
        Block {
            high: (value >> 64) as u64,
            low: value as u64,
        }
    }
}

impl From<Block> for u128 {
    fn from(block: Block) -> Self {
        ((block.high as u128) << 64) | block.low as u128
    }
}

impl From<&Block> for u128 {
    fn from(block: &Block) -> Self {
        u128::from(*block)
    }
}

/// A single value to be shared by a DPF, in the group of its `ValueType`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Value {
    #[prost(oneof = "value::Value", tags = "1, 2, 3, 4")]
    pub value: ::core::option::Option<value::Value>,
}

/// Nested message and enum types in `Value`.
pub mod value {
    /// An unsigned integer of up to 128 bits. Values that fit in 64 bits are
    /// stored in the `value_uint64` arm.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
    pub struct Integer {
        #[prost(oneof = "integer::Value", tags = "1, 2")]
        pub value: ::core::option::Option<integer::Value>,
    }

    /// Nested message and enum types in `Integer`.
    pub mod integer {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Oneof)]
        pub enum Value {
            #[prost(uint64, tag = "1")]
            ValueUint64(u64),
            #[prost(message, tag = "2")]
            ValueUint128(super::super::Block),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Tuple {
        #[prost(message, repeated, tag = "1")]
        pub elements: ::prost::alloc::vec::Vec<super::Value>,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(message, tag = "1")]
        Integer(super::value::Integer),
        #[prost(message, tag = "2")]
        Tuple(Tuple),
        /// Ring elements are encoded as their underlying integer.
        #[prost(message, tag = "3")]
        IntModN(super::value::Integer),
        #[prost(message, tag = "4")]
        XorWrapper(super::value::Integer),
    }
}

/// Describes the kind of values appearing as `beta` at one hierarchy level.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValueType {
    #[prost(oneof = "value_type::Type", tags = "1, 2, 3, 4")]
    pub r#type: ::core::option::Option<value_type::Type>,
}

/// Nested message and enum types in `ValueType`.
pub mod value_type {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
    pub struct Integer {
        #[prost(int32, tag = "1")]
        pub bitsize: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Tuple {
        #[prost(message, repeated, tag = "1")]
        pub elements: ::prost::alloc::vec::Vec<super::ValueType>,
    }

    /// Integers modulo a fixed modulus that fits in `base_integer`.
    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct IntModN {
        #[prost(message, optional, tag = "1")]
        pub base_integer: ::core::option::Option<Integer>,
        #[prost(message, optional, tag = "2")]
        pub modulus: ::core::option::Option<super::value::Integer>,
    }

    /// An unsigned integer with XOR as the group operation.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
    pub struct XorWrapper {
        #[prost(int32, tag = "1")]
        pub bitsize: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Integer(Integer),
        #[prost(message, tag = "2")]
        Tuple(Tuple),
        #[prost(message, tag = "3")]
        IntModN(IntModN),
        #[prost(message, tag = "4")]
        XorWrapper(XorWrapper),
    }
}

/// One hierarchy level of an incremental DPF.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DpfParameters {
    /// Logarithm of the domain size at this level. Must be in [0, 128].
    #[prost(int32, tag = "1")]
    pub log_domain_size: i32,
    /// Deprecated integer bit size. Only consulted when `value_type` is
    /// absent, in which case it is read as `Integer { bitsize }`.
    #[prost(int32, tag = "2")]
    pub element_bitsize: i32,
    #[prost(message, optional, tag = "3")]
    pub value_type: ::core::option::Option<ValueType>,
}

/// Per-tree-level public data that aligns the two parties' expansions.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CorrectionWord {
    #[prost(message, optional, tag = "1")]
    pub seed: ::core::option::Option<Block>,
    #[prost(bool, tag = "2")]
    pub control_left: bool,
    #[prost(bool, tag = "3")]
    pub control_right: bool,
    /// Value correction of the hierarchy level whose output is computed at
    /// this depth, if any. Contains one `Value` per packed block element.
    #[prost(message, repeated, tag = "4")]
    pub value_correction: ::prost::alloc::vec::Vec<Value>,
}

/// One party's key of a (possibly incremental) DPF.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DpfKey {
    #[prost(message, optional, tag = "1")]
    pub seed: ::core::option::Option<Block>,
    #[prost(message, repeated, tag = "2")]
    pub correction_words: ::prost::alloc::vec::Vec<CorrectionWord>,
    /// Party index, 0 or 1.
    #[prost(int32, tag = "3")]
    pub party: i32,
    /// The deepest tree level has no correction word of its own, so its value
    /// correction lives here.
    #[prost(message, repeated, tag = "4")]
    pub last_level_value_correction: ::prost::alloc::vec::Vec<Value>,
}

/// A saved partial evaluation: the seed and control bit reached at the end of
/// the path described by `prefix`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct PartialEvaluation {
    #[prost(message, optional, tag = "1")]
    pub prefix: ::core::option::Option<Block>,
    #[prost(message, optional, tag = "2")]
    pub seed: ::core::option::Option<Block>,
    #[prost(bool, tag = "3")]
    pub control_bit: bool,
}

/// Caller-owned scratch for incremental evaluation of a single key.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EvaluationContext {
    /// Parameters of the DPF this context belongs to.
    #[prost(message, repeated, tag = "1")]
    pub parameters: ::prost::alloc::vec::Vec<DpfParameters>,
    #[prost(message, optional, tag = "2")]
    pub key: ::core::option::Option<DpfKey>,
    /// Hierarchy level evaluated by the last call, or -1 before the first.
    #[prost(int32, tag = "3")]
    pub previous_hierarchy_level: i32,
    #[prost(message, repeated, tag = "4")]
    pub partial_evaluations: ::prost::alloc::vec::Vec<PartialEvaluation>,
    /// Hierarchy level at which `partial_evaluations` was taken.
    #[prost(int32, tag = "5")]
    pub partial_evaluations_level: i32,
}

/// Parameters of a distributed comparison function.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DcfParameters {
    #[prost(message, optional, tag = "1")]
    pub parameters: ::core::option::Option<DpfParameters>,
}

/// One party's key of a distributed comparison function.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DcfKey {
    #[prost(message, optional, tag = "1")]
    pub key: ::core::option::Option<DpfKey>,
}

/// A closed interval used by the multiple-interval-containment gate.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Interval {
    #[prost(message, optional, tag = "1")]
    pub lower_bound: ::core::option::Option<value::Integer>,
    #[prost(message, optional, tag = "2")]
    pub upper_bound: ::core::option::Option<value::Integer>,
}

/// Parameters of a multiple-interval-containment gate.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MicParameters {
    /// Logarithm of the group size. Must be in [0, 127].
    #[prost(int32, tag = "1")]
    pub log_group_size: i32,
    #[prost(message, repeated, tag = "2")]
    pub intervals: ::prost::alloc::vec::Vec<Interval>,
}

/// One party's key of a multiple-interval-containment gate.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MicKey {
    #[prost(message, optional, tag = "1")]
    pub dcf_key: ::core::option::Option<DcfKey>,
    /// One additive share of the output mask per interval.
    #[prost(message, repeated, tag = "2")]
    pub output_mask_share: ::prost::alloc::vec::Vec<value::Integer>,
}
