use std::{
    fs,
    os::unix::fs::{MetadataExt, PermissionsExt},
};

use overlaymigrate::{migrate, utils::DIAGNOSTIC_LOGFILE_ENV_VAR, MigrateError};
use serial_test::serial;

use super::fixture::{Fixture, BASE_LAYER, CHILD_LAYER};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Adds files with distinct modes and a symlink to both layers.
fn add_layer_content(fixture: &Fixture) -> anyhow::Result<()> {
    let base = fixture.legacy_layer(BASE_LAYER);
    fs::create_dir_all(base.join("etc"))?;
    fs::write(base.join("etc/passwd"), "root:x:0:0")?;
    fs::set_permissions(base.join("etc/passwd"), fs::Permissions::from_mode(0o640))?;
    fs::write(base.join("run.sh"), "#!/bin/sh\nexit 0\n")?;
    fs::set_permissions(base.join("run.sh"), fs::Permissions::from_mode(0o755))?;

    let child = fixture.legacy_layer(CHILD_LAYER);
    fs::write(child.join("readonly"), "fixed")?;
    fs::set_permissions(child.join("readonly"), fs::Permissions::from_mode(0o444))?;
    std::os::unix::fs::symlink("etc/passwd", child.join("passwd"))?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
#[serial]
async fn test_failed_migration_leaves_legacy_root() -> anyhow::Result<()> {
    let fixture = Fixture::new(false)?;
    fs::remove_dir_all(fixture.join("aufs/diff"))?;
    let before = fixture.legacy_snapshot()?;

    let log_path = fixture.join("migrate.log");
    std::env::set_var(DIAGNOSTIC_LOGFILE_ENV_VAR, &log_path);
    let result = migrate(fixture.root()).await;
    std::env::remove_var(DIAGNOSTIC_LOGFILE_ENV_VAR);

    let err = result.unwrap_err();
    assert!(matches!(err, MigrateError::LayerContentMissing { .. }));

    assert!(!fixture.join("overlay2").exists());
    assert!(!fixture.join("overlay2.migrating").exists());
    assert_eq!(fixture.legacy_snapshot()?, before);

    let config = fs::read_to_string(fixture.container_config())?;
    assert_eq!(config, r#"{"Driver": "aufs"}"#);

    let report = fs::read_to_string(&log_path)?;
    assert!(report.contains("failed during migrate phase"));
    assert!(report.contains(&err.to_string()));

    Ok(())
}

#[test_log::test(tokio::test)]
#[serial]
async fn test_failure_report_does_not_change_error() -> anyhow::Result<()> {
    let with_log = Fixture::new(false)?;
    let without_log = Fixture::new(false)?;
    for fixture in [&with_log, &without_log] {
        fs::remove_dir_all(fixture.legacy_layer(BASE_LAYER))?;
    }

    // A log file inside a regular file cannot be created
    fs::write(with_log.join("blocker"), "")?;
    std::env::set_var(DIAGNOSTIC_LOGFILE_ENV_VAR, with_log.join("blocker/migrate.log"));
    let logged = migrate(with_log.root()).await;
    std::env::remove_var(DIAGNOSTIC_LOGFILE_ENV_VAR);

    let unlogged = migrate(without_log.root()).await;

    let strip_root = |err: MigrateError, fixture: &Fixture| {
        err.to_string()
            .replace(&fixture.root().display().to_string(), "<root>")
    };
    assert_eq!(
        strip_root(logged.unwrap_err(), &with_log),
        strip_root(unlogged.unwrap_err(), &without_log)
    );

    Ok(())
}

#[test_log::test(tokio::test)]
#[serial]
async fn test_retry_after_failure() -> anyhow::Result<()> {
    let fixture = Fixture::new(false)?;
    let content = fixture.legacy_layer(BASE_LAYER);
    let parked = fixture.join("parked");
    fs::rename(&content, &parked)?;

    assert!(migrate(fixture.root()).await.is_err());
    assert!(!fixture.join("overlay2").exists());

    fs::rename(&parked, &content)?;
    migrate(fixture.root()).await?;
    assert!(fixture.join("overlay2").join(BASE_LAYER).join("diff/test").is_file());

    Ok(())
}

#[test_log::test(tokio::test)]
#[serial]
async fn test_failed_hardlink_migration_keeps_legacy_tree() -> anyhow::Result<()> {
    let fixture = Fixture::new(false)?;
    add_layer_content(&fixture)?;

    // Layers are converted before container configs are read, so this fails late
    let broken = fixture.join("containers/ffffffffffff");
    fs::create_dir_all(&broken)?;
    fs::write(broken.join("config.v2.json"), "{")?;

    let before = fixture.legacy_snapshot()?;
    let err = migrate(fixture.root()).await.unwrap_err();
    assert!(matches!(err, MigrateError::ConfigUnreadable { .. }));

    assert_eq!(fixture.legacy_snapshot()?, before);
    assert!(!fixture.join("overlay2").exists());
    assert!(!fixture.join("overlay2.migrating").exists());
    Ok(())
}

#[test_log::test(tokio::test)]
#[serial]
async fn test_hardlink_migration_keeps_legacy_tree() -> anyhow::Result<()> {
    let fixture = Fixture::new(false)?;
    add_layer_content(&fixture)?;
    let before = fixture.legacy_snapshot()?;

    migrate(fixture.root()).await?;
    assert_eq!(fixture.legacy_snapshot()?, before);

    // The new layer shares the legacy inode
    let legacy = fs::metadata(fixture.legacy_layer(BASE_LAYER).join("etc/passwd"))?;
    let migrated = fs::metadata(fixture.overlay_layer(BASE_LAYER).join("diff/etc/passwd"))?;
    assert_eq!(legacy.ino(), migrated.ino());
    assert_eq!(migrated.mode() & 0o7777, 0o640);

    Ok(())
}
