//! The Pinba wire message.
//!
//! Hand-maintained mirror of `proto/pinba.proto` (proto2). Maintained by
//! hand rather than generated so the crate builds without a protoc
//! toolchain; field numbers and modifiers must match the schema file.

#![allow(missing_docs)]

/// One request's worth of performance data, as sent to a collector in a
/// single UDP datagram.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(string, required, tag = "1")]
    pub hostname: ::prost::alloc::string::String,
    #[prost(string, required, tag = "2")]
    pub server_name: ::prost::alloc::string::String,
    #[prost(string, required, tag = "3")]
    pub script_name: ::prost::alloc::string::String,
    #[prost(uint32, required, tag = "4")]
    pub request_count: u32,
    #[prost(uint32, required, tag = "5")]
    pub document_size: u32,
    #[prost(uint32, required, tag = "6")]
    pub memory_peak: u32,
    #[prost(float, required, tag = "7")]
    pub request_time: f32,
    #[prost(float, required, tag = "8")]
    pub ru_utime: f32,
    #[prost(float, required, tag = "9")]
    pub ru_stime: f32,
    #[prost(uint32, repeated, packed = "false", tag = "10")]
    pub timer_hit_count: ::prost::alloc::vec::Vec<u32>,
    #[prost(float, repeated, packed = "false", tag = "11")]
    pub timer_value: ::prost::alloc::vec::Vec<f32>,
    #[prost(uint32, repeated, packed = "false", tag = "12")]
    pub timer_tag_count: ::prost::alloc::vec::Vec<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "13")]
    pub timer_tag_name: ::prost::alloc::vec::Vec<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "14")]
    pub timer_tag_value: ::prost::alloc::vec::Vec<u32>,
    #[prost(string, repeated, tag = "15")]
    pub dictionary: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(uint32, optional, tag = "16")]
    pub status: ::core::option::Option<u32>,
    #[prost(uint32, optional, tag = "17")]
    pub memory_footprint: ::core::option::Option<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "18")]
    pub tag_name: ::prost::alloc::vec::Vec<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "19")]
    pub tag_value: ::prost::alloc::vec::Vec<u32>,
    #[prost(float, repeated, packed = "false", tag = "20")]
    pub timer_ru_utime: ::prost::alloc::vec::Vec<f32>,
    #[prost(float, repeated, packed = "false", tag = "21")]
    pub timer_ru_stime: ::prost::alloc::vec::Vec<f32>,
    #[prost(string, optional, tag = "22")]
    pub schema: ::core::option::Option<::prost::alloc::string::String>,
}
