//! Checks an existing parser against its sample without generating code.

use crate::config::AgentConfig;
use crate::executor::ParserRuntime;
use crate::sample::{SchemaReader, Target};
use crate::validator::{compare, Verdict};
use crate::writer::ParserWriter;
use stmtcraft_error::Result;
use tracing::{info, warn};

/// Run the saved parser for `target` and compare its output with the sample CSV.
///
/// A missing or failing parser is a `Verdict::Fail`. Unreadable samples and
/// an unusable runtime are errors.
pub async fn verify_target<R: ParserRuntime>(
    config: &AgentConfig,
    runtime: &R,
    target: &Target,
) -> Result<Verdict> {
    let samples = SchemaReader::new(config.data_dir())
        .read(target)
        .map_err(|e| e.with_operation("verify::verify_target"))?;
    let parser = ParserWriter::new(config.parser_dir()).path_for(target);

    if !parser.is_file() {
        warn!(parser = %parser.display(), "parser file not found");
        return Ok(Verdict::Fail(format!("Parser file not found: {}", parser.display())));
    }

    info!(parser = %parser.display(), runtime = runtime.name(), "verifying parser");
    let verdict = match runtime.invoke(&parser, &samples.files.pdf).await {
        Ok(table) => compare(&samples.schema.table, &table),
        Err(err) if !err.consumes_attempt() => {
            return Err(err.with_operation("verify::verify_target"));
        }
        Err(err) => {
            warn!(error = %err, "parser failed");
            Verdict::Fail(err.message().to_string())
        }
    };
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use std::fs;
    use std::path::Path;
    use stmtcraft_error::{Error, ErrorKind};

    const CSV: &str = "Date,Amount\n01-08-2024,10.5\n";

    struct FixedRuntime(Option<Table>);

    struct NoPandas;

    impl ParserRuntime for NoPandas {
        fn name(&self) -> &str {
            "no-pandas"
        }

        async fn invoke(&self, _parser: &Path, _pdf: &Path) -> Result<Table> {
            Err(Error::config_invalid("cannot import pandas"))
        }
    }

    impl ParserRuntime for FixedRuntime {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn invoke(&self, _parser: &Path, _pdf: &Path) -> Result<Table> {
            self.0
                .clone()
                .ok_or_else(|| Error::execution_failed("Exception while running parse():\nValueError"))
        }
    }

    fn setup(with_parser: bool) -> (tempfile::TempDir, AgentConfig) {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data/icici");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("icici_sample.pdf"), "%PDF").unwrap();
        fs::write(data.join("icici_sample.csv"), CSV).unwrap();
        if with_parser {
            let dir = tmp.path().join("custom_parser");
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("icici_parser.py"), "def parse(p): ...\n").unwrap();
        }
        let config = AgentConfig::default().with_root(tmp.path());
        (tmp, config)
    }

    #[tokio::test]
    async fn test_verify_pass_and_fail() {
        let (_tmp, config) = setup(true);
        let target = Target::parse("icici").unwrap();

        let good = FixedRuntime(Some(Table::from_csv_str(CSV).unwrap()));
        assert_eq!(verify_target(&config, &good, &target).await.unwrap(), Verdict::Pass);

        let broken = FixedRuntime(None);
        let Verdict::Fail(reason) = verify_target(&config, &broken, &target).await.unwrap() else {
            panic!("expected failure");
        };
        assert!(reason.contains("ValueError"));
    }

    #[tokio::test]
    async fn test_verify_without_parser_fails() {
        let (_tmp, config) = setup(false);
        let verdict = verify_target(&config, &FixedRuntime(None), &Target::parse("icici").unwrap())
            .await
            .unwrap();
        assert!(!verdict.is_pass());
    }

    #[tokio::test]
    async fn test_verify_unusable_runtime_is_error() {
        let (_tmp, config) = setup(true);
        let err = verify_target(&config, &NoPandas, &Target::parse("icici").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[tokio::test]
    async fn test_verify_missing_samples_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AgentConfig::default().with_root(tmp.path());
        let err = verify_target(&config, &FixedRuntime(None), &Target::parse("sbi").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingSample);
    }
}
