pub mod error;
pub use error::CoreError;

pub mod secret;
pub use secret::SecretStore;

pub mod pki;
pub use pki::{Bundle, CertIssuer, IssueRequest, Pki, PkiConfig, PkiError, PkiTool};

pub mod registrar;
pub use registrar::{DeployError, Registrar, RegistrarConfig, SupervisorUnit};

pub mod dispatch;
pub use dispatch::{BootOutcome, DispatchError, Dispatcher, Step};
