//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod exception_log;
pub mod food;
pub mod gc_process_log;
pub mod order;
pub mod order_item;
pub mod plate;
pub mod plate_depot;
pub mod transaction;
pub mod user;
pub mod wallet;
pub mod worker;

// Re-export specific types to avoid conflicts
pub use exception_log::{
    Column as ExceptionLogColumn, Entity as ExceptionLog, Model as ExceptionLogModel,
};
pub use food::{Column as FoodColumn, Entity as Food, Model as FoodModel};
pub use gc_process_log::{
    Column as GcProcessLogColumn, Entity as GcProcessLog, Model as GcProcessLogModel,
};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use order_item::{Column as OrderItemColumn, Entity as OrderItem, Model as OrderItemModel};
pub use plate::{Column as PlateColumn, Entity as Plate, Model as PlateModel};
pub use plate_depot::{
    Column as PlateDepotColumn, Entity as PlateDepot, Model as PlateDepotModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
pub use wallet::{Column as WalletColumn, Entity as Wallet, Model as WalletModel};
pub use worker::{Column as WorkerColumn, Entity as Worker, Model as WorkerModel};
