//! CSV job lists.
//!
//! A job list has one table pair per line:
//!
//! ```text
//! source_schema,source_table,destination_schema,destination_table,columns
//! SAPISU,EABL,replica,eabl,
//! SAPISU,EANLH,replica,eanlh,ANLAGE;BIS;TARIFTYP
//! ```
//!
//! The header line is optional. The `columns` field is optional and holds a
//! `;`-separated column filter. Lines starting with `#` are ignored.
//! Malformed rows do not abort reading: they become defective jobs that
//! end as ERROR with a configuration error when run.

use super::job::JobSpec;
use crate::Result;
use crate::compare::TableMapping;
use crate::error::DriftError;
use crate::models::TableRef;
use std::io::{Read, Write};
use std::path::Path;

const HEADER: [&str; 5] = [
    "source_schema",
    "source_table",
    "destination_schema",
    "destination_table",
    "columns",
];

/// Reads a job list file.
///
/// # Errors
/// Returns an I/O error if the file cannot be opened.
pub fn read_job_list(path: &Path) -> Result<Vec<JobSpec>> {
    let file = std::fs::File::open(path)
        .map_err(|e| DriftError::io(format!("Failed to open job list {}", path.display()), e))?;
    let jobs = parse_job_list(file);
    tracing::info!("Read {} jobs from {}", jobs.len(), path.display());
    Ok(jobs)
}

/// Parses job list records from any reader.
pub fn parse_job_list<R: Read>(reader: R) -> Vec<JobSpec> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut jobs = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Unreadable job list row {}: {}", line.saturating_add(1), e);
                jobs.push(JobSpec::defective(
                    TableMapping::new(TableRef::new("", ""), TableRef::new("", "")),
                    format!("row {}: {e}", line.saturating_add(1)),
                ));
                continue;
            }
        };
        if line == 0
            && record
                .get(0)
                .is_some_and(|field| field.eq_ignore_ascii_case(HEADER[0]))
        {
            continue;
        }
        if record.iter().all(str::is_empty) {
            continue;
        }
        jobs.push(job_from_record(&record, line.saturating_add(1)));
    }
    jobs
}

fn job_from_record(record: &csv::StringRecord, line: usize) -> JobSpec {
    let field = |i: usize| record.get(i).unwrap_or_default().to_string();
    let source = TableRef::new(field(0), field(1));
    let destination = TableRef::new(field(2), field(3));
    let columns: Vec<String> = field(4)
        .split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    let mapping = TableMapping::new(source, destination).with_columns(columns);

    if record.len() < 4 {
        return JobSpec::defective(
            mapping,
            format!("row {line}: expected at least 4 fields, found {}", record.len()),
        );
    }
    if record.len() > HEADER.len() {
        return JobSpec::defective(
            mapping,
            format!("row {line}: expected at most 5 fields, found {}", record.len()),
        );
    }
    if let Err(e) = mapping.validate() {
        return JobSpec::defective(mapping, format!("row {line}: {e}"));
    }
    JobSpec::from_mapping(mapping)
}

/// Writes jobs as CSV with a header line.
///
/// # Errors
/// Returns a job list error if writing fails.
pub fn write_job_list_to<W: Write>(writer: W, jobs: &[JobSpec]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(HEADER)
        .map_err(|e| DriftError::job_list("Failed to write job list header", e))?;
    for job in jobs {
        let mapping = &job.mapping;
        let columns = mapping.columns.join(";");
        csv_writer
            .write_record([
                mapping.source.schema.as_str(),
                mapping.source.table.as_str(),
                mapping.destination.schema.as_str(),
                mapping.destination.table.as_str(),
                columns.as_str(),
            ])
            .map_err(|e| DriftError::job_list("Failed to write job list row", e))?;
    }
    csv_writer
        .flush()
        .map_err(|e| DriftError::io("Failed to flush job list", e))?;
    Ok(())
}

/// Writes jobs to a CSV file, replacing it if it exists.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_job_list(path: &Path, jobs: &[JobSpec]) -> Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| DriftError::io(format!("Failed to create job list {}", path.display()), e))?;
    write_job_list_to(file, jobs)?;
    tracing::info!("Wrote {} jobs to {}", jobs.len(), path.display());
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_header_and_filter() {
        let input = "source_schema,source_table,destination_schema,destination_table,columns\n\
                     SAPISU,EABL,replica,eabl,\n\
                     SAPISU,EANLH,replica,eanlh,ANLAGE; BIS ;TARIFTYP\n";
        let jobs = parse_job_list(input.as_bytes());
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.defect.is_none()));
        assert_eq!(jobs[0].mapping.source, TableRef::new("SAPISU", "EABL"));
        assert!(jobs[0].mapping.columns.is_empty());
        assert_eq!(jobs[1].mapping.columns, vec!["ANLAGE", "BIS", "TARIFTYP"]);
    }

    #[test]
    fn test_parse_headerless_four_columns() {
        let jobs = parse_job_list("a,b,c,d\n# skipped\ne,f,g,h\n".as_bytes());
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].mapping.destination, TableRef::new("g", "h"));
    }

    #[test]
    fn test_malformed_rows_become_defective_jobs() {
        let jobs = parse_job_list("a,b,c,d\nonly,three,fields\n,x,y,z\n".as_bytes());
        assert_eq!(jobs.len(), 3);
        assert!(jobs[0].defect.is_none());
        assert!(jobs[1].defect.as_deref().unwrap().contains("expected at least 4 fields"));
        assert!(jobs[2].defect.as_deref().unwrap().contains("source"));
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.csv");
        let jobs = vec![
            JobSpec::new(TableRef::new("s", "t1"), TableRef::new("d", "t1")),
            JobSpec::from_mapping(
                TableMapping::new(TableRef::new("s", "t2"), TableRef::new("d", "t2"))
                    .with_columns(["A", "B"]),
            ),
        ];
        write_job_list(&path, &jobs).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("source_schema,"));
        assert!(content.contains("s,t2,d,t2,A;B"));
        assert_eq!(read_job_list(&path).unwrap(), jobs);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_job_list(Path::new("/nonexistent/jobs.csv")).unwrap_err();
        assert!(matches!(err, DriftError::Io { .. }));
    }
}
