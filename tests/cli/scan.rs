use anyhow::Result;

use crate::{CliTest, stderr, stdout};

#[test]
fn test_scan_lists_candidates() -> Result<()> {
    let test = CliTest::new()?;
    test.write_file(
        "src/Welcome.tsx",
        r#"function getGreeting(user) {
  return `Hello, ${user.name}`;
}

export function Welcome({ user }) {
  return (
    <section>
      <h1>{getGreeting(user)}</h1>
      <input placeholder="Search" />
    </section>
  );
}
"#,
    )?;

    let output = test.scan_command().output()?;
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Welcome.tsx:8  complex  expression  \"getGreeting(user)\"  (context: 4 line(s))"));
    assert!(out.contains("Welcome.tsx:9  simple  jsx-attr  \"Search\""));
    assert!(out.contains("Found 2 candidate(s) in 1 file (1 simple, 1 complex, 0 ambiguous)"));

    // Scanning never writes.
    assert!(!test.root().join("i18n-report.json").exists());
    Ok(())
}

#[test]
fn test_scan_clean_project() -> Result<()> {
    let test = CliTest::with_file(
        "src/app.tsx",
        "export function App() { return <div>{t('home.title')}</div>; }\n",
    )?;

    let output = test.scan_command().output()?;
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Scanned 1 file - no hardcoded text found"));
    Ok(())
}

#[test]
fn test_scan_missing_root_is_fatal() -> Result<()> {
    let test = CliTest::new()?;

    let output = test.scan_command().args(["--root", "does-not-exist"]).output()?;
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("scan root does not exist: does-not-exist"));
    Ok(())
}

#[test]
fn test_scan_reports_unparsable_files() -> Result<()> {
    let test = CliTest::new()?;
    test.write_file("src/broken.tsx", "export const Broken = () => <p>Oops</p\n")?;
    test.write_file("src/fine.tsx", "export const Fine = () => <p>Fine</p>;\n")?;

    let output = test.scan_command().output()?;
    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.contains("Found 1 candidate(s)"));
    assert!(out.contains("1 file(s) could not be scanned"));
    Ok(())
}
