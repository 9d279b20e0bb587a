//! The fridge: a host-wide cache of ingredient archives and their unpacked
//! payloads, shared by every recipe run so the same ingredient is never
//! downloaded or unpacked twice.

mod inventory;
mod store;

pub use inventory::{Inventory, InventoryPack};
pub use store::{djb2_32, FridgeStore, UsedIngredient};
