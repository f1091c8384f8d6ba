//! Built-in agents.

mod echo;
mod routed;

pub use echo::EchoAgent;
pub use routed::RoutedAgent;
