#[path = "graph/support.rs"]
mod support;

#[path = "graph/editing.rs"]
mod editing;
#[path = "graph/layout.rs"]
mod layout;
#[path = "graph/molecules.rs"]
mod molecules;
#[path = "graph/persistence.rs"]
mod persistence;
#[path = "graph/propagation.rs"]
mod propagation;
#[path = "graph/session.rs"]
mod session;
