//! Builds a [`SceneContext`] from a manifest.
//!
//! Placeholders go in first so the letter (or whatever else is marked as a
//! stand-in) is reachable even if its model never loads. Everything else is
//! placed once loading has settled, in manifest order.

use std::collections::HashMap;

use glam::Vec3;
use log::{debug, info};
use rand::rngs::StdRng;

use crate::assets::{load_all, LoadReport, LoadRequest, ModelProvider, TimeSource};
use crate::frame::SceneContext;
use crate::interaction::{EntryId, InteractableEntry};
use crate::manifest::{ObjectSpec, SceneManifest};
use crate::motion::MotionRecord;
use crate::scene_graph::{NodeId, SceneNode, Transform, Visual};
use crate::ui::{UiCommand, UiSink};

/// Result of [`build_scene`].
#[derive(Debug)]
pub struct BuiltScene {
    pub context: SceneContext,
    pub report: LoadReport,
    /// Objects that ended up with no node because their model failed.
    pub skipped: Vec<String>,
}

struct Placeholder {
    node: NodeId,
    entry: Option<EntryId>,
}

/// Loads every model of `manifest` and assembles the scene.
///
/// Failed loads never abort the build. The returned context is in the
/// `Menu` phase.
pub async fn build_scene<P, T>(
    manifest: &SceneManifest,
    provider: &P,
    time: &T,
    rng: StdRng,
    ui: &mut dyn UiSink,
) -> BuiltScene
where
    P: ModelProvider + ?Sized,
    T: TimeSource + ?Sized,
{
    let mut ctx = SceneContext::new(manifest.settings.clone(), rng);
    ui.send(UiCommand::LoadProgress {
        fraction: 0.0,
        status: "Loading...".to_string(),
    });

    let mut placeholders = HashMap::new();
    for object in &manifest.objects {
        let Some(procedural) = object.procedural.filter(|p| p.placeholder) else {
            continue;
        };
        let node = ctx.graph.insert(SceneNode::new(
            format!("{}-placeholder", object.name),
            object.transform,
            Visual::Procedural(procedural.shape),
        ));
        let entry = object.interact.as_ref().map(|interact| {
            ctx.interactions.register_placeholder(InteractableEntry::new(
                node,
                interact.label.clone(),
                interact.kind,
            ))
        });
        placeholders.insert(object.name.as_str(), Placeholder { node, entry });
    }

    let requests: Vec<LoadRequest> = manifest
        .objects
        .iter()
        .filter(|object| !object.models.is_empty())
        .map(|object| LoadRequest {
            object: object.name.clone(),
            candidates: object.models.clone(),
        })
        .collect();
    let report = load_all(
        provider,
        &requests,
        &manifest.settings.loading,
        time,
        |done, total, object| {
            ui.send(UiCommand::LoadProgress {
                fraction: done as f32 / total.max(1) as f32,
                status: format!("Loading {object}..."),
            })
        },
    )
    .await;

    let mut skipped = Vec::new();
    for object in &manifest.objects {
        if !place_object(&mut ctx, object, &report, placeholders.get(object.name.as_str())) {
            skipped.push(object.name.clone());
        }
    }

    info!(
        "scene ready: {} nodes, {} motion records, {} interactables ({} models loaded, {} skipped)",
        ctx.graph.len(),
        ctx.motions.len(),
        ctx.interactions.len(),
        report.loaded_count(),
        skipped.len()
    );
    ctx.finish_loading(ui);
    BuiltScene {
        context: ctx,
        report,
        skipped,
    }
}

/// Places one object and its clones. Returns false if nothing could be placed.
fn place_object(
    ctx: &mut SceneContext,
    object: &ObjectSpec,
    report: &LoadReport,
    placeholder: Option<&Placeholder>,
) -> bool {
    let loaded = report.model_for(&object.name);
    let node = match (loaded, placeholder) {
        (Some(resolved), _) => {
            let mut node = SceneNode::new(
                object.name.clone(),
                object.transform,
                Visual::Model(resolved.model.clone()),
            );
            if object.animate {
                node.play_all_clips();
            }
            let id = ctx.graph.insert(node);
            if let Some(placeholder) = placeholder {
                retire_placeholder(ctx, placeholder, id);
            }
            id
        }
        (None, Some(placeholder)) => placeholder.node,
        (None, None) if object.models.is_empty() || object.procedural.is_some() => {
            let visual = object
                .procedural
                .map(|p| Visual::Procedural(p.shape))
                .unwrap_or_default();
            ctx.graph
                .insert(SceneNode::new(object.name.clone(), object.transform, visual))
        }
        (None, None) => return false,
    };

    let behavior = object
        .motion
        .instantiate(object.transform.position, &mut ctx.rng);
    ctx.motions.insert(MotionRecord::new(
        node,
        object.transform,
        behavior,
        &mut ctx.rng,
    ));

    let already_registered = placeholder.map_or(false, |p| p.entry.is_some());
    if let (Some(interact), false) = (&object.interact, already_registered) {
        ctx.interactions.register(InteractableEntry::new(
            node,
            interact.label.clone(),
            interact.kind,
        ));
    }

    if loaded.is_some() {
        for (index, clone) in object.clones.iter().enumerate() {
            let name = format!("{}#{}", object.name, index + 1);
            let Some(id) = ctx.graph.instantiate(node, name) else {
                continue;
            };
            let base = Transform {
                position: clone.position,
                rotation: object.transform.rotation,
                scale: Vec3::splat(clone.sample_scale(&mut ctx.rng)),
            };
            ctx.graph.set_transform(id, base);
            let behavior = object.motion.instantiate(base.position, &mut ctx.rng);
            ctx.motions
                .insert(MotionRecord::new(id, base, behavior, &mut ctx.rng));
        }
    } else if !object.clones.is_empty() {
        debug!("{}: no model, clones skipped", object.name);
    }
    true
}

fn retire_placeholder(ctx: &mut SceneContext, placeholder: &Placeholder, replacement: NodeId) {
    if let Some(node) = ctx.graph.get_mut(placeholder.node) {
        node.visual = Visual::Empty;
    }
    if let Some(entry) = placeholder.entry {
        if ctx
            .interactions
            .supersede_placeholder(entry, replacement, None)
        {
            debug!("placeholder {entry} now points at {replacement}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MemoryModelProvider, TimeSource};
    use crate::frame::GamePhase;
    use crate::interaction::ActivationKind;
    use rand::SeedableRng;
    use std::time::Duration;

    struct FrozenTime;

    impl TimeSource for FrozenTime {
        fn now(&self) -> Duration {
            Duration::ZERO
        }

        async fn sleep(&self, _duration: Duration) {}
    }

    const MANIFEST: &str = r#"
        <scene>
            <object name="postbox">
                <model>postbox.glb</model>
                <procedural shape="sphere" radius="0.5" placeholder="true"/>
                <position>8 0 3</position>
                <interact kind="letter" name="Love Letter"/>
            </object>
            <object name="jellyray">
                <model>missing.glb</model>
                <model>jellyray.glb</model>
                <position>15 12 10</position>
                <motion kind="pulse"/>
                <interact name="Cosmic Jellyray"/>
                <clone position="20 20 -15" scale-min="1" scale-max="1.8"/>
                <clone position="-25 16 20" scale-min="1" scale-max="1.8"/>
            </object>
            <object name="whale">
                <model>whale.glb</model>
                <motion kind="orbit"/>
            </object>
            <object name="sky-planet">
                <procedural shape="sphere" radius="8"/>
                <motion kind="spin"/>
            </object>
        </scene>
    "#;

    fn build(provider: &MemoryModelProvider) -> (BuiltScene, Vec<UiCommand>) {
        let manifest = SceneManifest::from_xml(MANIFEST).unwrap();
        let mut ui: Vec<UiCommand> = Vec::new();
        let built = pollster::block_on(build_scene(
            &manifest,
            provider,
            &FrozenTime,
            StdRng::seed_from_u64(4),
            &mut ui,
        ));
        (built, ui)
    }

    #[test]
    fn failed_models_are_skipped_and_the_rest_is_built() {
        let provider = MemoryModelProvider::new()
            .with("postbox.glb", &[])
            .with("jellyray.glb", &["Swim"]);
        let (built, ui) = build(&provider);
        let ctx = &built.context;

        assert_eq!(built.skipped, ["whale"]);
        assert_eq!(built.report.loaded_count(), 2);
        assert_eq!(ctx.phase(), GamePhase::Menu);
        assert!(ctx.graph.find("whale").is_none());
        // postbox placeholder + postbox + jellyray + 2 clones + planet
        assert_eq!(ctx.graph.len(), 6);
        assert_eq!(ctx.motions.len(), 5);
        assert_eq!(ctx.interactions.len(), 2);
        assert_eq!(ui.last(), Some(&UiCommand::ShowMenu));

        let jelly = ctx.graph.find("jellyray").unwrap();
        assert!(ctx.graph.get(jelly).unwrap().playback.is_some());
        let clone = ctx.graph.find("jellyray#2").unwrap();
        let scale = ctx.graph.transform(clone).unwrap().scale.x;
        assert!((1.0..=1.8).contains(&scale));
    }

    #[test]
    fn loaded_model_supersedes_placeholder() {
        let provider = MemoryModelProvider::new().with("postbox.glb", &[]);
        let (built, _) = build(&provider);
        let ctx = &built.context;
        let postbox = ctx.graph.find("postbox").unwrap();
        let (_, entry) = ctx
            .interactions
            .iter()
            .find(|(_, e)| e.kind == ActivationKind::OpenSpecialModal)
            .unwrap();
        assert_eq!(entry.target, postbox);
        assert!(!entry.is_placeholder());
        let stand_in = ctx.graph.find("postbox-placeholder").unwrap();
        assert!(matches!(ctx.graph.get(stand_in).unwrap().visual, Visual::Empty));
    }

    #[test]
    fn placeholder_survives_a_failed_load() {
        let provider = MemoryModelProvider::new();
        let (built, _) = build(&provider);
        let ctx = &built.context;
        let stand_in = ctx.graph.find("postbox-placeholder").unwrap();
        let (_, entry) = ctx.interactions.iter().next().unwrap();
        assert_eq!(entry.target, stand_in);
        assert!(entry.is_placeholder());
        assert!(!built.skipped.contains(&"postbox".to_string()));
        assert!(ctx.motions.get(stand_in).is_some());
    }
}
