pub mod dispatcher;
pub mod remote;
pub mod traits;


pub use dispatcher::{DispatchSettings, QueryDispatcher};
pub use remote::RemoteEngine;
pub use traits::PersistenceEngine;
