use std::{
    fs,
    os::unix::{fs::FileTypeExt, net::UnixListener},
};

use nix::unistd::Uid;
use overlaymigrate::{
    config::MigrationConfig,
    migrate,
    overlay::{decode_lower, link_id},
    whiteout::is_overlay_whiteout,
    Migrator, Phase,
};
use serial_test::serial;

use super::fixture::{Fixture, BASE_LAYER, CHILD_LAYER};

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
#[serial]
async fn test_migrate_then_commit() -> anyhow::Result<()> {
    let fixture = Fixture::new(false)?;

    migrate(fixture.root()).await?;
    assert!(fixture.join("overlay2").is_dir());
    assert!(fixture.join("aufs").is_dir());
    assert!(!fixture.join("overlay2.migrating").exists());

    // Second call commits
    migrate(fixture.root()).await?;
    assert!(!fixture.join("aufs").exists());
    assert!(fixture.join("overlay2").is_dir());

    // Nothing left to do
    migrate(fixture.root()).await?;
    assert!(fixture.join("overlay2").is_dir());
    assert!(!fixture.join("aufs").exists());

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_migrate_builds_overlay_layout() -> anyhow::Result<()> {
    let fixture = Fixture::new(false)?;
    let migrator = Migrator::new(MigrationConfig::builder().root(fixture.root()).build());

    assert_eq!(migrator.run().await?, Phase::MigratedUncommitted);

    let base = fixture.overlay_layer(BASE_LAYER);
    let child = fixture.overlay_layer(CHILD_LAYER);
    assert!(base.join("diff/test").is_file());
    assert!(child.join("diff").is_dir());
    assert!(!base.join("lower").exists());
    assert!(child.join("work").is_dir());

    let lower = fs::read_to_string(child.join("lower"))?;
    assert_eq!(decode_lower(&lower), [link_id(BASE_LAYER)]);

    let link = fs::read_to_string(base.join("link"))?;
    assert!(fixture.join("overlay2/l").join(&link).join("test").is_file());

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_migrate_rewrites_container_driver() -> anyhow::Result<()> {
    let fixture = Fixture::new(false)?;
    let migrator = Migrator::new(MigrationConfig::builder().root(fixture.root()).build());

    migrator.run().await?;

    let config: serde_json::Value =
        serde_json::from_slice(&fs::read(fixture.container_config())?)?;
    assert_eq!(config["Driver"], "overlay2");

    let container = fixture.container_config();
    let container = container.parent().unwrap();
    assert_eq!(fs::read_to_string(container.join("hostconfig.json"))?, "{}");
    assert!(container.join("checkpoints").is_dir());

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_migrate_tolerates_sockets() -> anyhow::Result<()> {
    let fixture = Fixture::new(false)?;
    let socket = fixture.legacy_layer(BASE_LAYER).join("socket");
    let _listener = UnixListener::bind(&socket)?;

    let migrator = Migrator::new(MigrationConfig::builder().root(fixture.root()).build());
    assert_eq!(migrator.run().await?, Phase::MigratedUncommitted);

    let migrated = fixture.overlay_layer(BASE_LAYER).join("diff/socket");
    assert!(fs::symlink_metadata(migrated)?.file_type().is_socket());

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_migrate_translates_whiteouts() -> anyhow::Result<()> {
    if !Uid::effective().is_root() {
        tracing::info!("skipping: whiteout nodes require root");
        return Ok(());
    }

    let fixture = Fixture::new(true)?;
    let migrator = Migrator::new(MigrationConfig::builder().root(fixture.root()).build());
    assert_eq!(migrator.run().await?, Phase::MigratedUncommitted);

    let diff = fixture.overlay_layer(CHILD_LAYER).join("diff");
    assert!(is_overlay_whiteout(&fs::symlink_metadata(diff.join("test"))?));
    assert!(!diff.join(".wh.test").exists());

    // The legacy marker is still in place until commit
    assert!(fixture.legacy_layer(CHILD_LAYER).join(".wh.test").exists());

    assert_eq!(migrator.run().await?, Phase::Committed);
    assert!(!fixture.join("aufs").exists());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_migrate_without_storage_root() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let migrator = Migrator::new(MigrationConfig::builder().root(temp.path()).build());

    assert_eq!(migrator.run().await?, Phase::Absent);
    assert_eq!(fs::read_dir(temp.path())?.count(), 0);
    Ok(())
}
