/// Header-less comma separated numeric tables
use std::path::Path;

use ndarray::Array2;

/// Decimal places written for every value
pub const DECIMALS: usize = 10;

/// Write `rows` to `path`, truncating any previous content.
pub fn write_rows<'a, P, I>(path: P, rows: I) -> crate::Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a [f64]>,
{
    write_records(path.as_ref(), rows)
}

/// Write every row of a 2-D array.
pub fn write_array<P: AsRef<Path>>(path: P, table: &Array2<f64>) -> crate::Result<()> {
    write_records(path.as_ref(), table.rows())
}

fn write_records<'a, R, I>(path: &Path, rows: I) -> crate::Result<()>
where
    R: IntoIterator<Item = &'a f64>,
    I: IntoIterator<Item = R>,
{
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;

    for row in rows {
        writer.write_record(row.into_iter().map(|v| format!("{:.*}", DECIMALS, v)))?;
    }

    writer.flush()?;
    Ok(())
}

/// Read a table whose rows all have `width` columns.
///
/// Returns `Ok(None)` when a row has a different width so callers can treat
/// the file as unusable rather than corrupt. A cell that is not a number is
/// an error.
pub fn read_array<P: AsRef<Path>>(
    path: P,
    width: usize,
) -> crate::Result<Option<Array2<f64>>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut values = Vec::new();
    let mut rows = 0;

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != width {
            log::warn!(
                "{:?} line {}: expected {} columns, found {}",
                path,
                line + 1,
                width,
                record.len()
            );
            return Ok(None);
        }

        for field in record.iter() {
            let value = field.parse::<f64>().map_err(|e| {
                crate::EffortError::Cache(format!(
                    "{:?} line {}: invalid number {:?}: {}",
                    path,
                    line + 1,
                    field,
                    e
                ))
            })?;
            values.push(value);
        }
        rows += 1;
    }

    let table = Array2::from_shape_vec((rows, width), values)
        .map_err(|e| crate::EffortError::ShapeMismatch(e.to_string()))?;
    Ok(Some(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_values_use_fixed_decimals() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.csv");

        write_rows(&path, [[1.0, -0.5].as_slice(), [0.123456789012, 2.0].as_slice()])?;

        let text = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1.0000000000,-0.5000000000");
        assert_eq!(lines[1], "0.1234567890,2.0000000000");
        Ok(())
    }

    #[test]
    fn test_read_back_array() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.csv");
        let table = array![[1.25, 2.5, -3.0], [0.0, 1e-4, 7.0]];

        write_array(&path, &table)?;
        let read = read_array(&path, 3)?.expect("table should be readable");
        assert_eq!(read, table);
        Ok(())
    }

    #[test]
    fn test_padded_values_are_accepted() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "1.0000000000, 2.0000000000\n")?;

        let read = read_array(&path, 2)?.expect("table should be readable");
        assert_eq!(read[[0, 1]], 2.0);
        Ok(())
    }

    #[test]
    fn test_wrong_width_is_unusable() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "1.0,2.0\n3.0\n")?;

        assert!(read_array(&path, 2)?.is_none());
        Ok(())
    }

    #[test]
    fn test_non_numeric_cell_is_error() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "1.0,abc\n")?;

        assert!(matches!(
            read_array(&path, 2),
            Err(crate::EffortError::Cache(_))
        ));
        Ok(())
    }
}
