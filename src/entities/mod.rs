pub mod audit_entry;
pub mod material_definition;
pub mod movement_record;
pub mod role_permission;
pub mod stock_count_entry;
pub mod stock_count_session;
