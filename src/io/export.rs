use crate::types::{BasemapResult, MosaicTable};
use std::io::Write;
use std::path::Path;

/// Write the table as CSV. The header row is always written, even with no rows.
pub fn write_csv<W: Write>(table: &MosaicTable, writer: W) -> BasemapResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(MosaicTable::COLUMNS)?;
    for row in table.rows() {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the table to a CSV file, creating parent directories as needed
pub fn write_csv_file<P: AsRef<Path>>(table: &MosaicTable, path: P) -> BasemapResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = std::fs::File::create(path)?;
    write_csv(table, file)?;
    log::info!("{} mosaic(s) saved to {}", table.len(), path.display());
    Ok(())
}
