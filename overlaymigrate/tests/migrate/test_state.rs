use overlaymigrate::state::{build_state, Layer, Meta, State};

use super::fixture::{Fixture, BASE_LAYER, CHILD_LAYER};

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_state_reads_layer_graph() -> anyhow::Result<()> {
    let fixture = Fixture::new(true)?;

    let state = build_state(fixture.join("aufs")).await?;

    let expected = State::new(vec![
        Layer::new(BASE_LAYER, vec![], vec![]),
        Layer::new(
            CHILD_LAYER,
            vec![BASE_LAYER.to_string()],
            vec![Meta::whiteout("test")],
        ),
    ])?;
    assert_eq!(state, expected);

    // Reading the graph leaves the legacy root as it was
    assert!(fixture.legacy_layer(CHILD_LAYER).join(".wh.test").exists());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_state_without_markers() -> anyhow::Result<()> {
    let fixture = Fixture::new(false)?;

    let state = build_state(fixture.join("aufs")).await?;

    assert_eq!(state.len(), 2);
    assert!(state.layers().iter().all(|layer| layer.get_meta().is_empty()));
    assert!(state.get(BASE_LAYER).map(Layer::is_base).unwrap_or(false));
    assert_eq!(
        state.get(CHILD_LAYER).map(|layer| layer.get_parent_ids().clone()),
        Some(vec![BASE_LAYER.to_string()])
    );
    Ok(())
}
