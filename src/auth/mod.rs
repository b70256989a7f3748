// Authorization module
// Bearer token decoding, the role policy table and start-up role provisioning

pub mod error;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod seed;
pub mod token;

pub use error::AuthError;
pub use middleware::AuthenticatedUser;
pub use models::Role;
pub use policy::Operation;
pub use token::{Claims, TokenService};
