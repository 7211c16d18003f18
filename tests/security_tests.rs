use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use tempfile::TempDir;
use css_pruner::{
    collect_files_with_security, purge, validate_input_file, PrunerError, PurgeArgs, SecurityConfig,
};

fn purge_args(dir: &Path) -> PurgeArgs {
    PurgeArgs {
        input: vec![format!("{}/*.css", dir.display())],
        sources: vec![format!("{}/*.jsx", dir.display())],
        output: None,
        report: None,
        config: None,
        exclude: vec![],
        tailwind: false,
        combine_media: false,
        minify: false,
        dry_run: true,
        verbose: true,
        jobs: None,
    }
}

#[tokio::test]
async fn test_file_size_limit() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("app.css"), ".flex{display:flex}").unwrap();

    // Create a file that's too large (> 10MB)
    let large_file = temp_dir.path().join("large_file.jsx");
    let content = "a".repeat(11 * 1024 * 1024);
    fs::write(&large_file, content).unwrap();

    let normal_file = temp_dir.path().join("normal_file.jsx");
    fs::write(&normal_file, r#"export const Component = () => <div className="flex">Test</div>;"#).unwrap();

    // Should succeed but skip the large file
    let result = purge(purge_args(temp_dir.path())).await.unwrap();
    assert_eq!(result.total_files_processed, 1);
    assert!(result.outputs[0].css.contains(".flex"));
}

#[tokio::test]
async fn test_symlink_handling() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("app.css"), ".flex{}").unwrap();

    let real_file = temp_dir.path().join("real_file.jsx");
    fs::write(&real_file, r#"export const Component = () => <div className="flex">Test</div>;"#).unwrap();

    let symlink_file = temp_dir.path().join("symlink_file.jsx");
    symlink(&real_file, &symlink_file).unwrap();

    let outside_dir = TempDir::new().unwrap();
    let outside_file = outside_dir.path().join("outside.jsx");
    fs::write(&outside_file, r#"export const Bad = () => <div className="bad">Bad</div>;"#).unwrap();
    let bad_symlink = temp_dir.path().join("bad_symlink.jsx");
    symlink(&outside_file, &bad_symlink).unwrap();

    // Symlinks are rejected by default
    let result = purge(purge_args(temp_dir.path())).await.unwrap();
    assert_eq!(result.total_files_processed, 1);
}

#[test]
fn test_symlink_target_outside_working_directory() {
    let temp_dir = TempDir::new().unwrap();
    let outside_dir = TempDir::new().unwrap();
    let outside_file = outside_dir.path().join("outside.jsx");
    fs::write(&outside_file, "x").unwrap();
    let link = temp_dir.path().join("link.jsx");
    symlink(&outside_file, &link).unwrap();

    let security = SecurityConfig {
        allow_symlinks: true,
        working_directory: temp_dir.path().to_path_buf(),
        ..SecurityConfig::default()
    };
    let err = validate_input_file(&link, &security).unwrap_err();
    assert!(matches!(err, PrunerError::SecurityError(_)));
    assert!(err.to_string().contains("outside working directory"));
}

#[test]
fn test_collect_deduplicates_and_excludes() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir(temp_dir.path().join("vendor")).unwrap();
    fs::write(temp_dir.path().join("a.html"), "<p>").unwrap();
    fs::write(temp_dir.path().join("vendor/b.html"), "<p>").unwrap();

    let patterns = vec![
        format!("{}/*.html", temp_dir.path().display()),
        format!("{}/**/*.html", temp_dir.path().display()),
    ];
    let exclude = vec![format!("{}/vendor/*", temp_dir.path().display())];
    let files = collect_files_with_security(&patterns, &exclude, &SecurityConfig::default()).unwrap();

    assert_eq!(files.len(), 1);
    assert!(files[0].0.ends_with("a.html"));
    assert_eq!(files[0].1, 3);
}

#[tokio::test]
async fn test_empty_file_handling() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("app.css"), ".flex{} .text-lg{} .gone{}").unwrap();

    fs::write(temp_dir.path().join("empty.jsx"), "").unwrap();
    fs::write(temp_dir.path().join("tiny.jsx"), "// comment").unwrap();
    fs::write(temp_dir.path().join("normal.jsx"), r#"
        export const Component = () => (
            <div className="flex flex-col items-center">
                <span className="text-lg font-bold">Test</span>
            </div>
        );
    "#).unwrap();

    let result = purge(purge_args(temp_dir.path())).await.unwrap();
    assert_eq!(result.total_files_processed, 3);
    assert_eq!(result.report.totals.retained, 2);
}

#[tokio::test]
async fn test_malformed_source_handling() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("app.css"), ".flex{} .broken{}").unwrap();

    fs::write(temp_dir.path().join("malformed.jsx"), r#"
        export const Component = () => {
            return <div className="flex">{{{ broken
        // Missing closing braces and broken syntax
    "#).unwrap();
    fs::write(temp_dir.path().join("binary.jsx"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();

    // Extraction never fails on content
    let result = purge(purge_args(temp_dir.path())).await.unwrap();
    assert_eq!(result.total_files_processed, 2);
    assert!(result.outputs[0].css.contains(".flex"));
}

#[tokio::test]
async fn test_concurrent_file_processing_safety() {
    let temp_dir = TempDir::new().unwrap();
    let mut css = String::new();
    for i in 0..100 {
        let file = temp_dir.path().join(format!("file_{}.jsx", i));
        fs::write(&file, format!(
            r#"export const Component{} = () => <div className="c{}">Test {}</div>;"#,
            i, i, i
        )).unwrap();
        css.push_str(&format!(".c{}{{a:b}}\n.unused{}{{a:b}}\n", i, i));
    }
    fs::write(temp_dir.path().join("app.css"), &css).unwrap();

    let mut outputs = Vec::new();
    for threads in [1, 2, 4, 8, 16] {
        let args = PurgeArgs {
            jobs: Some(threads),
            ..purge_args(temp_dir.path())
        };

        let result = purge(args).await.unwrap();
        assert_eq!(result.total_files_processed, 100);
        assert_eq!(result.report.totals.retained, 100);
        outputs.push(result.outputs[0].css.clone());
    }
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_permission_denied_handling() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("app.css"), ".flex{}").unwrap();

    let restricted_file = temp_dir.path().join("restricted.jsx");
    fs::write(&restricted_file, r#"export const Component = () => <div className="flex">Test</div>;"#).unwrap();

    let mut perms = fs::metadata(&restricted_file).unwrap().permissions();
    perms.set_mode(0o000);
    fs::set_permissions(&restricted_file, perms).unwrap();

    let result = purge(purge_args(temp_dir.path())).await;

    let mut perms = fs::metadata(&restricted_file).unwrap().permissions();
    perms.set_mode(0o644);
    fs::set_permissions(&restricted_file, perms).unwrap();

    // Root can still read the file
    if let Err(e) = result {
        assert!(matches!(e, PrunerError::Io(_)), "unexpected error: {}", e);
    }
}
