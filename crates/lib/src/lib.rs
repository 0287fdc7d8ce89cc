//! cdk-handler-lib: CDK template handler for infrastructure orchestration
//!
//! This crate turns a user-authored stack definition into a CloudFormation
//! template the orchestrator can deploy:
//! - `lua`: loads Lua stack definitions and resolves their constructors
//! - `synth`: the in-process construct model and cloud assembly writer
//! - `builder`: bootstrapped, bootstrapless and `cdk.json` build strategies
//! - `handler`: argument validation, prerequisite checks and builder dispatch

pub mod builder;
pub mod checker;
pub mod config;
pub mod environment;
pub mod handler;
pub mod lua;
pub mod process;
pub mod synth;

#[cfg(test)]
pub mod testutil;
