pub mod io;
pub mod models;
pub mod stages;
pub mod supabase;

pub use io::{read_table, write_table};
pub use models::{COMPANIES_TABLE, COMPANY_COLUMNS, Record, TableError, schema_coverage};
pub use stages::{
    AlignConfig, BatchFailure, JoinConfig, UploadConfig, UploadReport, align_to_schema, execute_stage1,
    execute_stage2, execute_stage3, join_tables, upload_table,
};
pub use supabase::{SupabaseClient, SupabaseConfig, TableSink};
