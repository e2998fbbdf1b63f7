// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// Export of scrape results to CSV files

mod csv_writer;

pub use csv_writer::CsvExporter;
