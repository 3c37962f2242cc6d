use anyhow::Result;
use serde_json::Value;

use crate::{CliTest, stderr, stdout};

const APP: &str = r#"export function App() {
  return (
    <main>
      <h1>Welcome back</h1>
      <button title="Save changes">Save</button>
    </main>
  );
}
"#;

#[test]
fn test_convert_is_a_dry_run_by_default() -> Result<()> {
    let test = CliTest::with_file("src/App.tsx", APP)?;

    let output = test.convert_command().output()?;
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("\"Welcome back\" -> welcome_back"));
    assert!(out.contains("Would convert 3 of 3 candidate(s)"));
    assert!(out.contains("Run with --apply to write these changes."));

    assert_eq!(test.read_file("src/App.tsx")?, APP);
    assert!(!test.root().join("public").exists());
    assert!(!test.root().join("i18n-report.json").exists());
    Ok(())
}

#[test]
fn test_convert_apply_rewrites_sources() -> Result<()> {
    let test = CliTest::with_file("src/App.tsx", APP)?;

    let output = test.convert_command().arg("--apply").output()?;
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Converted 3 of 3 candidate(s) in 1 file, 3 new key(s)"));

    insta::assert_snapshot!(test.read_file("src/App.tsx")?, @r#"
    import { useTranslation } from 'react-i18next';
    export function App() {
      const { t } = useTranslation();
      return (
        <main>
          <h1>{t('welcome_back')}</h1>
          <button title={t('save_changes')}>{t('save')}</button>
        </main>
      );
    }
    "#);

    let en: Value = serde_json::from_str(&test.read_file("public/locales/en/common.json")?)?;
    assert_eq!(en["welcome_back"], "Welcome back");
    assert_eq!(en["save"], "Save");
    // Without an oracle endpoint other locales get the source text.
    let es: Value = serde_json::from_str(&test.read_file("public/locales/es/common.json")?)?;
    assert_eq!(es["save_changes"], "Save changes");

    let report: Value = serde_json::from_str(&test.read_file("i18n-report.json")?)?;
    assert_eq!(report["summary"]["applied"], 3);
    assert_eq!(report["candidates"][0]["status"], "applied");
    Ok(())
}

#[test]
fn test_convert_twice_changes_nothing() -> Result<()> {
    let test = CliTest::with_file("src/App.tsx", APP)?;

    test.convert_command().arg("--apply").output()?;
    let converted = test.read_file("src/App.tsx")?;
    let dictionary = test.read_file("public/locales/en/common.json")?;

    let output = test.convert_command().arg("--apply").output()?;
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("no hardcoded text found"));
    assert_eq!(test.read_file("src/App.tsx")?, converted);
    assert_eq!(test.read_file("public/locales/en/common.json")?, dictionary);
    Ok(())
}

#[test]
fn test_convert_keeps_existing_dictionary_values() -> Result<()> {
    let test = CliTest::with_file("src/App.tsx", APP)?;
    test.write_file(
        "public/locales/es/common.json",
        r#"{"save": "Guardar", "legacy": "Antiguo"}"#,
    )?;

    test.convert_command().arg("--apply").output()?;

    let es: Value = serde_json::from_str(&test.read_file("public/locales/es/common.json")?)?;
    assert_eq!(es["save"], "Guardar");
    assert_eq!(es["legacy"], "Antiguo");
    assert_eq!(es["welcome_back"], "Welcome back");
    Ok(())
}

#[test]
fn test_convert_uses_config_locales() -> Result<()> {
    let test = CliTest::with_file("src/App.tsx", APP)?;
    test.write_file(
        ".lingofitrc.json",
        r#"{"locales": ["en", "fr"], "localesDir": "locales"}"#,
    )?;

    let output = test.convert_command().arg("--apply").output()?;
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(test.root().join("locales/fr/common.json").exists());
    assert!(!test.root().join("locales/es").exists());
    Ok(())
}

#[test]
fn test_unreachable_oracle_aborts_without_writes() -> Result<()> {
    let test = CliTest::with_file("src/App.tsx", APP)?;
    test.write_file(
        ".lingofitrc.json",
        r#"{"oracle": {"maxAttempts": 1, "timeoutMs": 2000, "minIntervalMs": 0}}"#,
    )?;

    let output = test
        .convert_command()
        .args(["--apply", "--oracle-endpoint", "http://127.0.0.1:9/translate"])
        .output()?;

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("oracle unreachable: all 3 call(s) failed"));
    assert_eq!(test.read_file("src/App.tsx")?, APP);
    assert!(!test.root().join("i18n-report.json").exists());
    Ok(())
}

#[test]
fn test_convert_backup_keeps_original_source() -> Result<()> {
    let test = CliTest::with_file("src/App.tsx", APP)?;

    let output = test.convert_command().args(["--apply", "--backup"]).output()?;
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    assert_eq!(test.read_file("src/App.tsx.backup")?, APP);
    assert!(test.read_file("src/App.tsx")?.contains("{t('save')}"));
    Ok(())
}

#[test]
fn test_convert_malformed_dictionary_writes_nothing() -> Result<()> {
    let test = CliTest::with_file("src/App.tsx", APP)?;
    test.write_file("public/locales/es/common.json", "[]")?;

    let output = test.convert_command().arg("--apply").output()?;
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("must be an object"), "stderr: {}", stderr(&output));

    assert_eq!(test.read_file("src/App.tsx")?, APP);
    assert!(!test.root().join("public/locales/en/common.json").exists());
    assert!(!test.root().join("i18n-report.json").exists());
    Ok(())
}
