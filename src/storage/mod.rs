mod memory;
mod models;
mod postgres;
mod store;

pub use self::{
    memory::MemoryStore,
    postgres::{Db, PgStore, connect, migrate},
    store::Store,
};
