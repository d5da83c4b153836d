mod common;

use common::{acme_plugin_entries, gradle_api_entries, write_jar};
use plugin_analyzer::analyzer::{
    INTERNAL_API_TITLE, OVERRIDE_GETTER_TITLE, OVERRIDE_SETTER_TITLE, extend_type_title,
};
use plugin_analyzer::batch::{BatchContext, analyze_artifact, analyze_batch};
use plugin_analyzer::bytecode::Instruction;
use plugin_analyzer::cache::UniverseCache;
use plugin_analyzer::config::{AnalyzerConfig, ArtifactRequest};
use plugin_analyzer::error::LoadError;
use plugin_analyzer::report::{ArtifactReport, Level};
use plugin_analyzer::resolve::LocalRepositoryResolver;
use plugin_analyzer::universe::Universe;
use std::path::{Path, PathBuf};

struct Fixture {
    _dir: tempfile::TempDir,
    m2: PathBuf,
    plugin_jar: PathBuf,
    gradle_jar: PathBuf,
}

fn fixture() -> anyhow::Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let m2 = dir.path().join("m2");
    let plugin_jar = m2.join("com/acme/acme-plugin/1.0/acme-plugin-1.0.jar");
    write_jar(&plugin_jar, &acme_plugin_entries())?;
    std::fs::write(
        m2.join("com/acme/acme-plugin/1.0/acme-plugin-1.0.pom"),
        "<project><url>https://acme.example</url><scm><url>https://git.example/acme</url></scm></project>",
    )?;
    let gradle_jar = dir.path().join("gradle/gradle-api.jar");
    write_jar(&gradle_jar, &gradle_api_entries())?;
    Ok(Fixture {
        _dir: dir,
        m2,
        plugin_jar,
        gradle_jar,
    })
}

fn config_with_runtime(gradle_jar: &Path) -> AnalyzerConfig {
    AnalyzerConfig {
        runtime_classpath: vec![gradle_jar.to_path_buf()],
        ..AnalyzerConfig::default()
    }
}

fn messages(report: &ArtifactReport, title: &str) -> Vec<(Level, String)> {
    report
        .groups
        .iter()
        .find(|g| g.title == title)
        .map(|g| g.findings.iter().map(|f| (f.level, f.message.clone())).collect())
        .unwrap_or_default()
}

#[test]
fn universe_open_decodes_real_jars() -> anyhow::Result<()> {
    let fx = fixture()?;
    let config = AnalyzerConfig::default();
    let universe = Universe::open(
        &[fx.plugin_jar.clone(), fx.gradle_jar.clone()],
        &config.runtime_packages,
    )?;

    let task = universe.resolve("com.acme.OverridingTask").unwrap();
    assert_eq!(task.superclass.as_deref(), Some("org.gradle.api.DefaultTask"));
    let getter = task.declared_method("getDescription", "()Ljava/lang/String;").unwrap();
    assert!(matches!(
        getter.code.as_deref(),
        Some([Instruction::Load { .. }, Instruction::Invoke { .. }, Instruction::Return { .. }])
    ));

    let id = universe.id_of("com.acme.OverridingTask").unwrap();
    assert!(universe.is_subtype_of(id, "org.gradle.api.Task"));
    assert!(universe.resolve("java.lang.Object").unwrap().opaque);
    assert!(universe.resolve("org.gradle.api.Plugin").unwrap().is_interface());
    Ok(())
}

#[cfg(unix)]
#[test]
fn unreadable_class_links_fail_the_open() -> anyhow::Result<()> {
    let fx = fixture()?;
    let config = AnalyzerConfig::default();
    let dir = tempfile::tempdir()?;
    let classes = dir.path().join("classes");
    std::fs::create_dir_all(&classes)?;
    std::fs::write(dir.path().join("corrupt.bin"), b"\xCA\xFE")?;
    std::os::unix::fs::symlink(dir.path().join("corrupt.bin"), classes.join("Linked.class"))?;

    let paths = [classes.clone(), fx.gradle_jar.clone()];
    assert!(matches!(
        Universe::open(&paths, &config.runtime_packages),
        Err(LoadError::Malformed { .. })
    ));

    std::fs::remove_file(classes.join("Linked.class"))?;
    std::os::unix::fs::symlink(dir.path().join("gone.class"), classes.join("Dangling.class"))?;
    assert!(Universe::open(&paths, &config.runtime_packages).is_err());
    Ok(())
}

#[test]
fn standard_checks_on_a_resolved_artifact() -> anyhow::Result<()> {
    let fx = fixture()?;
    let config = config_with_runtime(&fx.gradle_jar);
    let resolver = LocalRepositoryResolver::new(&fx.m2);
    let context = BatchContext {
        config: &config,
        resolver: &resolver,
        cache: None,
    };

    let report = analyze_artifact(&ArtifactRequest::new("com.acme:acme-plugin"), &context);
    assert!(!report.is_failed(), "{report:?}");
    assert_eq!(report.artifact.source_url.as_deref(), Some("https://git.example/acme"));

    let titles: Vec<&str> = report.groups.iter().map(|g| g.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Task should extend DefaultTask",
            OVERRIDE_SETTER_TITLE,
            OVERRIDE_GETTER_TITLE,
            INTERNAL_API_TITLE
        ]
    );
    assert_eq!(extend_type_title("org.gradle.api.DefaultTask"), titles[0]);

    assert_eq!(
        messages(&report, titles[0]),
        vec![(
            Level::Error,
            "Type `com.acme.BadTask` should extend `org.gradle.api.DefaultTask` instead of `org.gradle.api.internal.AbstractTask`".to_string()
        )]
    );
    assert_eq!(
        messages(&report, OVERRIDE_SETTER_TITLE),
        vec![(
            Level::Warn,
            "The setter `setGroup(String)` in `com.acme.OverridingTask` overrides Gradle API from `org.gradle.api.internal.AbstractTask` with custom logic".to_string()
        )]
    );
    assert_eq!(
        messages(&report, OVERRIDE_GETTER_TITLE),
        vec![(
            Level::Info,
            "The getter `getDescription()` in `com.acme.OverridingTask` overrides Gradle API from `org.gradle.api.internal.AbstractTask`, but calls only super()".to_string()
        )]
    );

    let internal = messages(&report, INTERNAL_API_TITLE);
    assert_eq!(internal.len(), 2, "{internal:?}");
    assert!(internal.contains(&(
        Level::Error,
        "Type `com.acme.AcmePlugin` references internal type `org.gradle.api.internal.project.ProjectInternal` (matches `org.gradle.**.internal.**`)".to_string()
    )));
    assert!(internal.contains(&(
        Level::Error,
        "Type `com.acme.BadTask` extends internal type `org.gradle.api.internal.AbstractTask` (matches `org.gradle.**.internal.**`)".to_string()
    )));
    Ok(())
}

#[test]
fn minimum_level_drops_info_groups() -> anyhow::Result<()> {
    let fx = fixture()?;
    let config = AnalyzerConfig {
        minimum_level: Level::Warn,
        ..config_with_runtime(&fx.gradle_jar)
    };
    let resolver = LocalRepositoryResolver::new(&fx.m2);
    let context = BatchContext {
        config: &config,
        resolver: &resolver,
        cache: None,
    };
    let report = analyze_artifact(&ArtifactRequest::new("com.acme:acme-plugin:1.0"), &context);
    assert!(report.groups.iter().all(|g| g.title != OVERRIDE_GETTER_TITLE));
    assert!(
        report
            .groups
            .iter()
            .flat_map(|g| &g.findings)
            .all(|f| f.level >= Level::Warn)
    );
    Ok(())
}

#[test]
fn missing_host_api_fails_the_artifact_only() -> anyhow::Result<()> {
    let fx = fixture()?;
    let with_api = config_with_runtime(&fx.gradle_jar);
    let without_api = AnalyzerConfig::default();
    let resolver = LocalRepositoryResolver::new(&fx.m2);

    let context = BatchContext {
        config: &without_api,
        resolver: &resolver,
        cache: None,
    };
    let requests = vec![
        ArtifactRequest::new("com.acme:acme-plugin:1.0"),
        ArtifactRequest::new("com.acme:missing:1.0"),
    ];
    let reports = analyze_batch(&requests, &context)?;
    assert_eq!(reports.len(), 2);
    let failure = reports[0].failure.as_deref().unwrap();
    assert!(failure.contains("not on the classpath"), "{failure}");
    assert!(reports[1].failure.as_deref().unwrap().contains("com.acme:missing:1.0"));

    let context = BatchContext {
        config: &with_api,
        resolver: &resolver,
        cache: None,
    };
    assert!(!analyze_batch(&requests[..1], &context)?[0].is_failed());
    Ok(())
}

#[test]
fn cached_universes_give_identical_reports() -> anyhow::Result<()> {
    let fx = fixture()?;
    let config = config_with_runtime(&fx.gradle_jar);
    let resolver = LocalRepositoryResolver::new(&fx.m2);
    let cache_dir = tempfile::tempdir()?;
    let cache = UniverseCache::open(cache_dir.path().join("universe.lmdb"))?;

    let uncached = BatchContext {
        config: &config,
        resolver: &resolver,
        cache: None,
    };
    let cached = BatchContext {
        config: &config,
        resolver: &resolver,
        cache: Some(&cache),
    };
    let mut request = ArtifactRequest::new("com.acme:acme-plugin:1.0");
    request.paths = vec![fx.plugin_jar.clone()];

    let expected = analyze_artifact(&request, &uncached);
    let first = analyze_artifact(&request, &cached);
    let second = analyze_artifact(&request, &cached);
    assert_eq!(cache.len()?, 1);
    assert_eq!(first, expected);
    assert_eq!(second, expected);
    Ok(())
}
