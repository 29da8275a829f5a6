use std::{fs, path::Path};

use dubuild::{
    compiler::CompileMode,
    config::Config,
    environment::Environment,
    error::BuildError,
    minifier::IdentityMinifier,
    orchestrator::{BuildMode, Builder},
    proxies,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn config(root: &Path) -> Config {
    Config {
        source_dir: root.join("src"),
        output_dir: root.join("out"),
        git: false,
        ..Config::default()
    }
}

fn builder(config: Config) -> Builder {
    let environment: Environment = [("BUILD_NAME", "radar")].into_iter().collect();
    Builder::new(config, environment)
}

fn build_error(err: &anyhow::Error) -> &BuildError {
    err.downcast_ref::<BuildError>()
        .unwrap_or_else(|| panic!("expected a BuildError, got {err:#}"))
}

/// vec <- screen <- main, plus an unrelated file that must not be bundled
fn radar_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "src/lib/vec.lua", "Vec = {}\n");
    write(root, "src/lib/screen.lua", "--@require vec\nScreen = {}\n");
    write(root, "src/unused.lua", "Unused = true\n");
    write(
        root,
        "src/main.lua",
        "--@require screen vec\n--@timer refresh\nprint('%BUILD_NAME%')\n",
    );
    temp
}

#[test]
fn test_plain_build_writes_handler_table() {
    let temp = radar_project();
    let written = builder(config(temp.path()))
        .build_and_save(BuildMode::Plain)
        .unwrap();
    assert_eq!(written, vec![temp.path().join("out/out.json")]);

    let json: Value = serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
    let handlers = json["handlers"].as_array().unwrap();
    assert_eq!(handlers.len(), 3 + proxies::proxy_count(1) + 1);

    assert_eq!(handlers[0]["code"], "Vec = {}\n");
    assert_eq!(handlers[1]["code"], "--@require vec\nScreen = {}\n");
    assert_eq!(
        handlers[2]["code"],
        "--@require screen vec\n--@timer refresh\nprint('radar')\n"
    );
    assert_eq!(handlers[0]["filter"]["slotKey"], "-1");
    assert_eq!(handlers[0]["filter"]["signature"], "start");
    assert_eq!(handlers[0]["key"], "0");

    let tick = handlers
        .iter()
        .find(|h| h["filter"]["signature"] == "tick(timerId)")
        .unwrap();
    assert_eq!(tick["filter"]["args"], serde_json::json!([{ "value": "refresh" }]));

    let index = handlers.last().unwrap();
    assert_eq!(index["filter"]["slotKey"], "-3");
    assert_eq!(index["key"], (handlers.len() - 1).to_string());
    assert!(
        index["code"]
            .as_str()
            .unwrap()
            .contains("_G._ModuleIndex[2]='main.lua';")
    );

    for section in ["methods", "events"] {
        assert_eq!(json[section], serde_json::json!([]));
    }
    assert!(json["slots"].as_object().unwrap().contains_key("-3"));
}

#[test]
fn test_minified_build_uses_min_suffix() {
    let temp = radar_project();
    let written = builder(config(temp.path()))
        .build_and_save(BuildMode::Minified)
        .unwrap();
    assert_eq!(written, vec![temp.path().join("out/out.min.json")]);

    let json: Value = serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
    let handlers = json["handlers"].as_array().unwrap();
    assert_eq!(handlers.len(), 1 + proxies::proxy_count(1));
    assert_eq!(
        handlers[0]["code"],
        "Vec={}\nScreen={}\nprint('radar')"
    );
}

#[test]
fn test_both_modes_share_one_resolution() {
    let temp = radar_project();
    let written = builder(config(temp.path()))
        .build_and_save(BuildMode::Both)
        .unwrap();
    assert_eq!(
        written,
        vec![
            temp.path().join("out/out.json"),
            temp.path().join("out/out.min.json"),
        ]
    );
    assert!(written.iter().all(|path| path.is_file()));
}

#[test]
fn test_out_filename_directive_names_artifacts() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/main.lua",
        "--@outFilename radar.json\nprint(1)\n",
    );

    let written = builder(config(temp.path()))
        .build_and_save(BuildMode::Both)
        .unwrap();
    assert_eq!(
        written,
        vec![
            temp.path().join("out/radar.json"),
            temp.path().join("out/radar.min.json"),
        ]
    );
}

#[test]
fn test_excluded_directory_is_not_discovered() {
    let temp = radar_project();
    let config = Config {
        exclude: vec![temp.path().join("src/lib")],
        ..config(temp.path())
    };

    let err = builder(config).build(CompileMode::PerFile).unwrap_err();
    match build_error(&err) {
        BuildError::UnresolvedDependency { file, dependency } => {
            assert_eq!(file, "main.lua");
            assert_eq!(dependency, "screen");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_strict_discovery_reports_every_broken_file() {
    let temp = radar_project();
    write(temp.path(), "src/broken_a.lua", "--@bogus\n");
    write(temp.path(), "src/broken_b.lua", "--@timer bad id!\n");
    write(temp.path(), "src/copy/vec.lua", "Vec = {}\n");

    let err = builder(config(temp.path()))
        .build(CompileMode::PerFile)
        .unwrap_err();
    assert!(matches!(
        build_error(&err),
        BuildError::DiscoveryFailed { count: 3 }
    ));
}

#[test]
fn test_non_strict_discovery_skips_broken_files() {
    let temp = radar_project();
    write(temp.path(), "src/broken.lua", "--@bogus\n");

    let config = Config {
        strict: false,
        ..config(temp.path())
    };
    let artifact = builder(config).build(CompileMode::PerFile).unwrap();
    assert_eq!(artifact.filename, Path::new("out.json"));
    assert_eq!(artifact.module.len(), 3 + proxies::proxy_count(1) + 1);
}

#[test]
fn test_missing_main_file() {
    let temp = radar_project();
    let config = Config {
        main_file: Some(temp.path().join("src/radar.lua")),
        ..config(temp.path())
    };

    let err = builder(config).build(CompileMode::PerFile).unwrap_err();
    match build_error(&err) {
        BuildError::RootNotFound(name) => assert_eq!(name, "radar.lua"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_cycle_aborts_build() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a.lua", "--@require b\n");
    write(temp.path(), "src/b.lua", "--@require a\n");
    write(temp.path(), "src/main.lua", "--@require a\n");

    let err = builder(config(temp.path()))
        .build_and_save(BuildMode::Plain)
        .unwrap_err();
    assert!(matches!(
        build_error(&err),
        BuildError::CyclicDependency { .. }
    ));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_custom_extension_and_minifier() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/util.luau", "-- kept\nUtil = {}\n");
    write(temp.path(), "src/main.luau", "--@require util\nMain = {}\n");
    write(temp.path(), "src/ignored.lua", "--@bogus\n");

    let config = Config {
        extension: "luau".into(),
        ..config(temp.path())
    };
    let artifact = builder(config)
        .with_minifier(Box::new(IdentityMinifier))
        .build(CompileMode::Minified)
        .unwrap();

    assert_eq!(
        artifact.module.handlers()[0].code,
        "-- kept\nUtil = {}\n\n--@require util\nMain = {}\n\n"
    );
}

#[test]
fn test_dependency_graph_is_emitted() {
    let temp = radar_project();
    let graph = temp.path().join("deps.dot");

    builder(config(temp.path()))
        .with_graph_output(Some(graph.clone()))
        .build_and_save(BuildMode::Plain)
        .unwrap();

    let dot = fs::read_to_string(graph).unwrap();
    assert!(dot.starts_with("digraph"));
    for name in ["vec.lua", "screen.lua", "main.lua"] {
        assert!(dot.contains(name), "{name} missing from {dot}");
    }
    assert!(!dot.contains("unused.lua"));
}

#[test]
fn test_out_filename_cannot_leave_output_dir() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/main.lua",
        "--@outFilename ../escaped.json\nprint(1)\n",
    );

    let err = builder(config(temp.path()))
        .build_and_save(BuildMode::Plain)
        .unwrap_err();
    assert!(matches!(
        build_error(&err),
        BuildError::DiscoveryFailed { count: 1 }
    ));
    assert!(!temp.path().join("escaped.json").exists());
}
