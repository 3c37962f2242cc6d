use anyhow::{Context, Result};
use serde_json::Value;

use crate::{CliTest, stderr, stdout};

#[test]
fn test_init_creates_config() -> Result<()> {
    let test = CliTest::new()?;

    let output = test.command().arg("init").output()?;
    assert_eq!(output.status.code(), Some(0));
    insta::assert_snapshot!(stdout(&output), @"✓ Created .lingofitrc.json");

    let content = test.read_file(".lingofitrc.json")?;
    let parsed: Value = serde_json::from_str(&content).context("Config should be valid JSON")?;
    assert_eq!(parsed["sourceLocale"], "en");
    assert_eq!(parsed["localesDir"], "public/locales");
    assert_eq!(parsed["maxContextLines"], 80);
    assert_eq!(parsed["maxDependencyDepth"], 3);
    assert!(parsed.get("oracle").is_some());

    Ok(())
}

#[test]
fn test_init_fails_if_exists() -> Result<()> {
    let test = CliTest::with_file(".lingofitrc.json", "{}")?;

    let output = test.command().arg("init").output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains(".lingofitrc.json already exists"));
    assert_eq!(test.read_file(".lingofitrc.json")?, "{}");

    Ok(())
}

#[test]
fn test_init_config_is_immediately_usable() -> Result<()> {
    let test = CliTest::new()?;
    test.command().arg("init").output()?;
    test.write_file(
        "src/app.tsx",
        r#"export function App() { return <div>Test</div>; }"#,
    )?;

    let output = test.scan_command().output()?;
    assert!(
        output.status.success(),
        "scan should work with the initialized config. stderr: {}",
        stderr(&output)
    );

    Ok(())
}
