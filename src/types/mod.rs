//! Data types shared by the store and the HTTP layer

mod item;

pub use item::{DashboardData, Item, ItemCreate, ItemUpdate};
