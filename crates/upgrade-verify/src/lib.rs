//! Upgrade specifications, proposal assembly and the verifier every participant runs
//! independently before signing.

pub mod assembler;
pub mod errors;
pub mod spec;
pub mod verifier;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_specs;

pub use assembler::assemble_proposal;
pub use errors::{AssemblyError, RegistryError, UpgradeSpecError, VerificationFailure};
pub use spec::{UpgradeRegistry, UpgradeSpecification};
pub use verifier::UpgradeVerifier;
