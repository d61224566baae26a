//! The reconstruction engine: per-frame orchestration state machine.
//!
//! Owns the scene, both render states, the current view, the tracking state
//! and the pose database, and drives the collaborators through the per-frame
//! pipeline: view construction → tracking → (relocalization on failure) →
//! fusion → raycast. The engine never fuses with an unresolved pose, and the
//! live render state always reflects the last accepted pose.

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::camera::{ImageSize, Intrinsics, RgbdCalib};
use crate::error::EngineError;
use crate::geometry::SE3;
use crate::mapping::{DenseMapper, RenderState, Scene, SceneParams, TsdfMapper};
use crate::meshing::{BlockMesher, Mesh, MeshingEngine};
use crate::relocalization::{DepthFingerprintRelocaliser, PoseDatabase, Relocaliser};
use crate::tracking::{ProjectiveIcpTracker, Tracker, TrackingState, TrackingVerdict};
use crate::view::{ColorFrame, ImuSample, RawDepthFrame, RgbdViewBuilder, View, ViewBuilder};
use crate::viz::{colormap_depth, ImageType, SceneRenderer, VisualisationEngine};

use super::settings::Settings;

/// Engine-level processing mode, derived from the tracking verdict. Makes
/// the first-frame bypass an explicit named sub-state rather than a bare
/// boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No frame processed since construction or the last reset; the next
    /// frame seeds the pose at identity without invoking the tracker.
    Uninitialised,
    /// Normal frame-to-model tracking.
    Tracking,
    /// Tracking failed; every frame attempts appearance-based recovery
    /// until a database match is found or the engine is reset.
    Relocalising,
}

/// The collaborator set driven by the engine. Concrete implementations are
/// selected at construction time.
pub struct EngineComponents {
    pub view_builder: Box<dyn ViewBuilder>,
    pub tracker: Box<dyn Tracker>,
    pub mapper: Box<dyn DenseMapper>,
    pub relocaliser: Box<dyn Relocaliser>,
    pub mesher: Box<dyn MeshingEngine>,
    pub visualiser: Box<dyn VisualisationEngine>,
}

/// Real-time dense reconstruction engine.
///
/// Single-threaded cooperative: each call runs to completion, and the host
/// application must serialize `process_frame`, `update_mesh` and `get_image`
/// against one instance.
pub struct ReconstructionEngine {
    settings: Settings,
    calib: RgbdCalib,

    view_builder: Box<dyn ViewBuilder>,
    tracker: Box<dyn Tracker>,
    mapper: Box<dyn DenseMapper>,
    relocaliser: Box<dyn Relocaliser>,
    mesher: Box<dyn MeshingEngine>,
    visualiser: Box<dyn VisualisationEngine>,

    scene: Scene,
    render_live: RenderState,
    render_freeview: Option<RenderState>,
    view: Option<View>,
    tracking: TrackingState,
    pose_db: PoseDatabase,
    mesh: Option<Mesh>,

    tracking_active: bool,
    fusion_active: bool,
    main_processing_active: bool,
    initialised: bool,
    phase: EnginePhase,

    frames_processed: u64,
    relocalisation_count: u32,
    /// Well-tracked frames seen since the last reset; drives the keyframe
    /// insertion interval.
    good_frames: u64,
}

impl ReconstructionEngine {
    /// Create an engine with the default collaborator stack (RGB-D view
    /// builder, projective ICP tracker, TSDF mapper, depth-fingerprint
    /// relocalizer).
    pub fn new(settings: Settings, calib: RgbdCalib) -> Self {
        let components = EngineComponents {
            view_builder: Box::new(RgbdViewBuilder::new(
                calib.clone(),
                settings.min_depth_m,
                settings.max_depth_m,
            )),
            tracker: Box::new(
                ProjectiveIcpTracker::new(settings.icp_iterations)
                    .with_imu_orientation(settings.use_imu_orientation),
            ),
            mapper: Box::new(TsdfMapper::new(
                settings.min_depth_m as f64,
                settings.max_depth_m as f64,
            )),
            relocaliser: Box::new(DepthFingerprintRelocaliser::new(
                settings.reloc_acceptance_dist_m,
            )),
            mesher: Box::new(BlockMesher::new()),
            visualiser: Box::new(SceneRenderer::new()),
        };
        Self::with_components(settings, calib, components)
    }

    /// Create an engine with an explicit collaborator set.
    pub fn with_components(
        settings: Settings,
        calib: RgbdCalib,
        components: EngineComponents,
    ) -> Self {
        let scene = Scene::new(SceneParams {
            voxel_size_m: settings.voxel_size_m,
            truncation_m: settings.truncation_m,
            max_weight: settings.max_integration_weight,
            max_blocks: settings.max_blocks,
        });
        let render_live = RenderState::new(
            calib.depth_size.width,
            calib.depth_size.height,
            calib.depth_intrinsics,
        );

        Self {
            settings,
            calib,
            view_builder: components.view_builder,
            tracker: components.tracker,
            mapper: components.mapper,
            relocaliser: components.relocaliser,
            mesher: components.mesher,
            visualiser: components.visualiser,
            scene,
            render_live,
            render_freeview: None,
            view: None,
            tracking: TrackingState::new(),
            pose_db: PoseDatabase::new(),
            mesh: None,
            tracking_active: true,
            fusion_active: true,
            main_processing_active: true,
            initialised: false,
            phase: EnginePhase::Uninitialised,
            frames_processed: 0,
            relocalisation_count: 0,
            good_frames: 0,
        }
    }

    /// Process one frame through the pipeline and return its final verdict.
    ///
    /// Fails only on malformed input (no state mutated) or fatal scene
    /// exhaustion; ordinary tracking loss is reported in-band as `Failed`.
    pub fn process_frame(
        &mut self,
        color: &ColorFrame,
        raw_depth: &RawDepthFrame,
        imu: Option<ImuSample>,
    ) -> Result<TrackingVerdict, EngineError> {
        // View construction happens even when paused so that later image
        // queries still reflect the latest frame. A build failure rejects
        // the frame before anything else is touched.
        let view = self.view_builder.build(color, raw_depth, imu)?;

        if !self.main_processing_active {
            self.view = Some(view);
            return Ok(self.tracking.verdict);
        }

        // Tracking stage. `verdict_fresh` records whether a verdict was
        // produced this frame; with tracking disabled the previous one
        // stands and the failure counters must not move.
        let mut verdict = self.tracking.verdict;
        let mut verdict_fresh = false;

        if !self.initialised {
            // First frame since construction or reset: there is no surface
            // to track against, so seed at identity and call it good.
            self.tracking.pose = SE3::identity();
            verdict = TrackingVerdict::Good;
            verdict_fresh = true;
            self.initialised = true;
            info!("tracking initialised at identity");
        } else if self.tracking_active {
            let out = self
                .tracker
                .track(&view, &self.tracking.pose, &self.render_live);
            verdict_fresh = true;

            match out.verdict {
                TrackingVerdict::Good | TrackingVerdict::Poor => {
                    self.tracking.pose = out.pose;
                    verdict = out.verdict;
                }
                TrackingVerdict::Failed => {
                    verdict = self.relocalise(&view);
                }
            }
        }

        if verdict_fresh {
            match verdict {
                TrackingVerdict::Good => self.relocalisation_count = 0,
                TrackingVerdict::Poor | TrackingVerdict::Failed => {
                    self.relocalisation_count += 1
                }
            }
        }
        self.phase = if verdict == TrackingVerdict::Failed {
            EnginePhase::Relocalising
        } else {
            EnginePhase::Tracking
        };

        // Fusion: only with an activity flag and a resolved pose. Never on
        // unresolved failure; a bad pose would corrupt the volume for good.
        if self.fusion_active && verdict.pose_usable() {
            self.mapper.fuse(&view, &self.tracking.pose, &mut self.scene)?;
        } else {
            debug!(?verdict, fusion_active = self.fusion_active, "fusion skipped");
        }

        // Keyframe policy: remember every Nth well-tracked frame. An
        // interval of 0 disables insertion entirely.
        if verdict_fresh && verdict == TrackingVerdict::Good {
            self.good_frames += 1;
            let interval = self.settings.keyframe_interval as u64;
            if interval > 0 && (self.good_frames - 1) % interval == 0 {
                let descriptor = self.relocaliser.describe(&view);
                self.pose_db.insert(descriptor, self.tracking.pose.clone());
                debug!(entries = self.pose_db.len(), "pose database keyframe added");
            }
        }

        // The live render state is next frame's tracking reference: refresh
        // it from the final pose even when fusion was skipped.
        self.mapper.raycast(
            &self.scene,
            &self.tracking.pose,
            &self.calib.depth_intrinsics,
            &mut self.render_live,
        );

        self.frames_processed += 1;
        self.tracking.verdict = verdict;
        self.view = Some(view);
        Ok(verdict)
    }

    /// Relocalization path for a frame whose tracking failed. Returns the
    /// frame's final verdict; the pose is only moved if a database candidate
    /// was found.
    fn relocalise(&mut self, view: &View) -> TrackingVerdict {
        warn!(
            consecutive_failures = self.relocalisation_count + 1,
            "tracking failed, attempting relocalization"
        );

        let Some(candidate) = self.relocaliser.query(view, &self.pose_db) else {
            // Miss: keep the previous pose, stay failed, retry next frame.
            return TrackingVerdict::Failed;
        };

        // Adopt the candidate, refresh the reference raycast from it, and
        // give the tracker one refinement attempt.
        self.tracking.pose = candidate.clone();
        self.mapper.raycast(
            &self.scene,
            &candidate,
            &self.calib.depth_intrinsics,
            &mut self.render_live,
        );
        let retry = self.tracker.track(view, &candidate, &self.render_live);
        self.tracking.pose = retry.pose;
        info!(verdict = ?retry.verdict, "relocalization candidate adopted");
        retry.verdict
    }

    /// Re-extract the surface mesh from the current scene, replacing the
    /// stored snapshot.
    pub fn update_mesh(&mut self) -> &Mesh {
        let mesh = self.mesher.extract(&self.scene);
        self.mesh.insert(mesh)
    }

    /// Render a requested image type.
    ///
    /// With no explicit pose, input types come from the current view and
    /// scene types from the live render state ("follow camera"). With a
    /// pose, the scene is raycast into the freeview render state, which this
    /// call may allocate or overwrite; the live render state is never
    /// touched.
    pub fn get_image(
        &mut self,
        ty: ImageType,
        pose: Option<&SE3>,
        intrinsics: Option<&Intrinsics>,
    ) -> RgbaImage {
        if ty.is_input_passthrough() {
            return match (&self.view, ty) {
                (Some(view), ImageType::InputColor) => view.color.clone(),
                (Some(view), _) => colormap_depth(&view.depth),
                (None, _) => {
                    RgbaImage::new(self.calib.rgb_size.width, self.calib.rgb_size.height)
                }
            };
        }

        match pose {
            None => self.visualiser.render(&self.scene, &self.render_live, ty),
            Some(pose) => {
                let k = intrinsics.copied().unwrap_or(self.calib.depth_intrinsics);
                let size = self.calib.depth_size;
                let freeview = self
                    .render_freeview
                    .get_or_insert_with(|| RenderState::new(size.width, size.height, k));
                self.mapper.raycast(&self.scene, pose, &k, freeview);
                self.visualiser.render(&self.scene, freeview, ty)
            }
        }
    }

    /// Clear the scene, render states, pose database and counters, and
    /// return tracking to the uninitialised state. Activity flags survive.
    pub fn reset_all(&mut self) {
        info!("engine reset");
        self.scene.clear();
        self.render_live.clear();
        self.render_freeview = None;
        self.view = None;
        self.tracking.reset();
        self.pose_db.clear();
        self.mesh = None;
        self.initialised = false;
        self.phase = EnginePhase::Uninitialised;
        self.frames_processed = 0;
        self.relocalisation_count = 0;
        self.good_frames = 0;
    }

    // Activity switches. All idempotent; redundant calls are harmless.

    pub fn turn_on_tracking(&mut self) {
        self.tracking_active = true;
    }

    pub fn turn_off_tracking(&mut self) {
        self.tracking_active = false;
    }

    pub fn turn_on_integration(&mut self) {
        self.fusion_active = true;
    }

    pub fn turn_off_integration(&mut self) {
        self.fusion_active = false;
    }

    pub fn turn_on_main_processing(&mut self) {
        self.main_processing_active = true;
    }

    pub fn turn_off_main_processing(&mut self) {
        self.main_processing_active = false;
    }

    // Read-only accessors.

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn tracking_state(&self) -> &TrackingState {
        &self.tracking
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn image_size(&self) -> ImageSize {
        self.calib.rgb_size
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn relocalisation_count(&self) -> u32 {
        self.relocalisation_count
    }

    pub fn pose_database(&self) -> &PoseDatabase {
        &self.pose_db
    }

    pub fn live_render_state(&self) -> &RenderState {
        &self.render_live
    }

    pub fn freeview_render_state(&self) -> Option<&RenderState> {
        self.render_freeview.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::scene::VoxelCoord;
    use crate::relocalization::FrameDescriptor;
    use crate::tracking::TrackOutput;
    use image::{Luma, Rgba};
    use nalgebra::Vector3;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    const W: u32 = 16;
    const H: u32 = 12;

    /// Tracker that replays a scripted verdict sequence. A non-failed track
    /// advances the prior by a fixed step; a failed one echoes the prior.
    struct ScriptedTracker {
        script: RefCell<VecDeque<TrackingVerdict>>,
        step: Vector3<f64>,
        calls: Rc<Cell<usize>>,
        priors: Rc<RefCell<Vec<SE3>>>,
    }

    impl Tracker for ScriptedTracker {
        fn track(&mut self, _view: &View, prior: &SE3, _reference: &RenderState) -> TrackOutput {
            self.calls.set(self.calls.get() + 1);
            self.priors.borrow_mut().push(prior.clone());
            let verdict = self
                .script
                .borrow_mut()
                .pop_front()
                .unwrap_or(TrackingVerdict::Good);
            let pose = if verdict == TrackingVerdict::Failed {
                prior.clone()
            } else {
                prior.compose(&SE3::from_translation(self.step))
            };
            TrackOutput { pose, verdict }
        }
    }

    /// Mapper that records calls and leaves a visible mark in the scene per
    /// fuse: one fresh block with a single SDF zero crossing.
    struct CountingMapper {
        fuse_calls: Rc<Cell<usize>>,
        raycast_calls: Rc<Cell<usize>>,
    }

    impl DenseMapper for CountingMapper {
        fn fuse(
            &mut self,
            _view: &View,
            _pose: &SE3,
            scene: &mut Scene,
        ) -> Result<(), EngineError> {
            let z = self.fuse_calls.get() as i32 * 8;
            for (dz, sdf) in [(0, -0.5f32), (1, 0.5f32)] {
                let vc = VoxelCoord { x: 0, y: 0, z: z + dz };
                scene.allocate_for(vc)?;
                if let Some(v) = scene.voxel_mut(vc) {
                    v.sdf = sdf;
                    v.weight = 5;
                }
            }
            self.fuse_calls.set(self.fuse_calls.get() + 1);
            Ok(())
        }

        fn raycast(
            &self,
            _scene: &Scene,
            pose: &SE3,
            intrinsics: &Intrinsics,
            out: &mut RenderState,
        ) {
            self.raycast_calls.set(self.raycast_calls.get() + 1);
            out.pose = pose.clone();
            out.intrinsics = *intrinsics;
            out.set_hit(
                out.width() / 2,
                out.height() / 2,
                Vector3::new(0.0, 0.0, 1.0),
                Vector3::new(0.0, 0.0, -1.0),
            );
        }
    }

    /// Relocalizer replaying scripted query answers.
    struct ScriptedReloc {
        answers: RefCell<VecDeque<Option<SE3>>>,
    }

    impl Relocaliser for ScriptedReloc {
        fn describe(&self, _view: &View) -> FrameDescriptor {
            FrameDescriptor { cells: vec![1.0] }
        }

        fn query(&self, _view: &View, _db: &PoseDatabase) -> Option<SE3> {
            self.answers.borrow_mut().pop_front().flatten()
        }
    }

    struct Probes {
        fuse_calls: Rc<Cell<usize>>,
        track_calls: Rc<Cell<usize>>,
        priors: Rc<RefCell<Vec<SE3>>>,
    }

    fn test_calib() -> RgbdCalib {
        let k = Intrinsics {
            fx: 10.0,
            fy: 10.0,
            cx: W as f64 / 2.0,
            cy: H as f64 / 2.0,
        };
        RgbdCalib::new(k, ImageSize::new(W, H), None, 0.001)
    }

    fn test_engine(
        keyframe_interval: u32,
        script: Vec<TrackingVerdict>,
        reloc_answers: Vec<Option<SE3>>,
    ) -> (ReconstructionEngine, Probes) {
        let settings = Settings {
            keyframe_interval,
            max_blocks: 64,
            ..Settings::default()
        };
        let calib = test_calib();

        let fuse_calls = Rc::new(Cell::new(0));
        let track_calls = Rc::new(Cell::new(0));
        let priors = Rc::new(RefCell::new(Vec::new()));

        let components = EngineComponents {
            view_builder: Box::new(RgbdViewBuilder::new(calib.clone(), 0.2, 3.0)),
            tracker: Box::new(ScriptedTracker {
                script: RefCell::new(script.into()),
                step: Vector3::new(0.01, 0.0, 0.0),
                calls: track_calls.clone(),
                priors: priors.clone(),
            }),
            mapper: Box::new(CountingMapper {
                fuse_calls: fuse_calls.clone(),
                raycast_calls: Rc::new(Cell::new(0)),
            }),
            relocaliser: Box::new(ScriptedReloc {
                answers: RefCell::new(reloc_answers.into()),
            }),
            mesher: Box::new(BlockMesher::new()),
            visualiser: Box::new(SceneRenderer::new()),
        };

        let engine = ReconstructionEngine::with_components(settings, calib, components);
        (
            engine,
            Probes {
                fuse_calls,
                track_calls,
                priors,
            },
        )
    }

    fn frame() -> (ColorFrame, RawDepthFrame) {
        (
            ColorFrame::from_pixel(W, H, Rgba([120, 80, 40, 255])),
            RawDepthFrame::from_pixel(W, H, Luma([1000])),
        )
    }

    fn process(engine: &mut ReconstructionEngine) -> TrackingVerdict {
        let (color, depth) = frame();
        engine.process_frame(&color, &depth, None).unwrap()
    }

    #[test]
    fn test_first_frame_bypasses_tracker_with_good_verdict() {
        let (mut engine, probes) = test_engine(10, vec![], vec![]);
        assert_eq!(engine.phase(), EnginePhase::Uninitialised);

        let verdict = process(&mut engine);
        assert_eq!(verdict, TrackingVerdict::Good);
        assert_eq!(probes.track_calls.get(), 0);
        assert_eq!(engine.tracking_state().pose, SE3::identity());
        assert_eq!(engine.phase(), EnginePhase::Tracking);
        assert_eq!(engine.frames_processed(), 1);
        // Fusion ran on the conventional first frame.
        assert_eq!(probes.fuse_calls.get(), 1);
        assert!(!engine.scene().is_empty());
    }

    #[test]
    fn test_paused_mode_retains_view_without_processing() {
        let (mut engine, probes) = test_engine(10, vec![], vec![]);
        process(&mut engine);
        process(&mut engine);
        assert_eq!(engine.frames_processed(), 2);

        engine.turn_off_main_processing();
        let verdict = process(&mut engine);
        // Previous verdict echoed, nothing processed, view still refreshed.
        assert_eq!(verdict, TrackingVerdict::Good);
        assert_eq!(engine.frames_processed(), 2);
        assert_eq!(probes.fuse_calls.get(), 2);
        assert!(engine.view().is_some());

        engine.turn_on_main_processing();
        process(&mut engine);
        assert_eq!(engine.frames_processed(), 3);
    }

    #[test]
    fn test_invalid_frame_rejected_without_state_change() {
        let (mut engine, probes) = test_engine(10, vec![], vec![]);
        let color = ColorFrame::from_pixel(W, H, Rgba([0, 0, 0, 255]));
        let bad_depth = RawDepthFrame::new(W / 2, H);

        let err = engine.process_frame(&color, &bad_depth, None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFrame { .. }));
        assert_eq!(engine.frames_processed(), 0);
        assert!(engine.scene().is_empty());
        assert!(engine.view().is_none());
        assert_eq!(probes.fuse_calls.get(), 0);
    }

    #[test]
    fn test_no_fusion_while_tracking_unresolved() {
        let (mut engine, probes) = test_engine(
            10,
            vec![TrackingVerdict::Failed, TrackingVerdict::Failed],
            vec![None, None],
        );
        process(&mut engine); // first-frame bypass, fuses
        let pose_before = engine.tracking_state().pose.clone();
        let blocks_before = engine.scene().num_allocated_blocks();

        for _ in 0..2 {
            let verdict = process(&mut engine);
            assert_eq!(verdict, TrackingVerdict::Failed);
            assert_eq!(engine.phase(), EnginePhase::Relocalising);
        }
        // Failed frames changed neither the scene nor the pose.
        assert_eq!(probes.fuse_calls.get(), 1);
        assert_eq!(engine.scene().num_allocated_blocks(), blocks_before);
        assert_eq!(engine.tracking_state().pose, pose_before);
        assert_eq!(engine.relocalisation_count(), 2);
    }

    #[test]
    fn test_relocalisation_count_resets_on_good() {
        let (mut engine, _) = test_engine(
            10,
            vec![
                TrackingVerdict::Poor,
                TrackingVerdict::Poor,
                TrackingVerdict::Good,
            ],
            vec![],
        );
        process(&mut engine);
        assert_eq!(engine.relocalisation_count(), 0);
        process(&mut engine);
        assert_eq!(engine.relocalisation_count(), 1);
        process(&mut engine);
        assert_eq!(engine.relocalisation_count(), 2);
        process(&mut engine);
        assert_eq!(engine.relocalisation_count(), 0);
    }

    #[test]
    fn test_poor_verdict_still_fuses() {
        let (mut engine, probes) = test_engine(10, vec![TrackingVerdict::Poor], vec![]);
        process(&mut engine);
        let verdict = process(&mut engine);
        assert_eq!(verdict, TrackingVerdict::Poor);
        assert_eq!(probes.fuse_calls.get(), 2);
    }

    #[test]
    fn test_integration_toggle_freezes_scene() {
        let (mut engine, probes) = test_engine(10, vec![], vec![]);
        engine.turn_off_integration();
        for _ in 0..3 {
            assert_eq!(process(&mut engine), TrackingVerdict::Good);
        }
        assert_eq!(probes.fuse_calls.get(), 0);
        assert!(engine.scene().is_empty());

        // Re-enabling resumes on the next frame only.
        engine.turn_on_integration();
        process(&mut engine);
        assert_eq!(probes.fuse_calls.get(), 1);
    }

    #[test]
    fn test_failed_streak_then_relocalization_recovery() {
        let candidate = SE3::from_translation(Vector3::new(1.0, 0.0, 0.0));
        // Frame 1 is the bypass; frames 2-6 fail with no match; frame 7
        // fails, matches, and the re-track comes back Good.
        let script = vec![
            TrackingVerdict::Failed,
            TrackingVerdict::Failed,
            TrackingVerdict::Failed,
            TrackingVerdict::Failed,
            TrackingVerdict::Failed,
            TrackingVerdict::Failed,
            TrackingVerdict::Good,
        ];
        let reloc = vec![None, None, None, None, None, Some(candidate.clone())];
        let (mut engine, probes) = test_engine(1, script, reloc);

        process(&mut engine);
        let blocks_after_first = engine.scene().num_allocated_blocks();

        for i in 1..=5 {
            assert_eq!(process(&mut engine), TrackingVerdict::Failed);
            assert_eq!(engine.relocalisation_count(), i);
            assert_eq!(engine.tracking_state().pose, SE3::identity());
        }
        assert_eq!(engine.scene().num_allocated_blocks(), blocks_after_first);

        let verdict = process(&mut engine);
        assert_eq!(verdict, TrackingVerdict::Good);
        assert_eq!(engine.relocalisation_count(), 0);
        assert_eq!(engine.phase(), EnginePhase::Tracking);
        // The re-track ran with the candidate as prior and refined from it.
        assert_eq!(probes.priors.borrow().last().unwrap(), &candidate);
        assert_eq!(
            engine.tracking_state().pose,
            candidate.compose(&SE3::from_translation(Vector3::new(0.01, 0.0, 0.0)))
        );
        // Fusion executed for the recovered frame.
        assert_eq!(probes.fuse_calls.get(), 2);
    }

    #[test]
    fn test_keyframe_insertion_interval() {
        let (mut engine, _) = test_engine(2, vec![], vec![]);
        for _ in 0..5 {
            process(&mut engine);
        }
        // Good frames 1, 3 and 5 insert.
        assert_eq!(engine.pose_database().len(), 3);
    }

    #[test]
    fn test_keyframe_interval_zero_disables_insertion() {
        let (mut engine, _) = test_engine(0, vec![], vec![]);
        for _ in 0..5 {
            assert_eq!(process(&mut engine), TrackingVerdict::Good);
        }
        assert!(engine.pose_database().is_empty());
        assert_eq!(engine.frames_processed(), 5);
    }

    #[test]
    fn test_reset_restores_first_frame_convention() {
        let (mut engine, probes) = test_engine(10, vec![], vec![]);
        engine.turn_off_integration();
        for _ in 0..3 {
            process(&mut engine);
        }
        let track_calls_before = probes.track_calls.get();

        engine.reset_all();
        assert!(engine.scene().is_empty());
        assert_eq!(engine.tracking_state().pose, SE3::identity());
        assert_eq!(engine.frames_processed(), 0);
        assert_eq!(engine.relocalisation_count(), 0);
        assert!(engine.pose_database().is_empty());
        assert_eq!(engine.phase(), EnginePhase::Uninitialised);
        assert!(engine.view().is_none());

        // Next frame is a first frame again: no tracker call, Good verdict.
        assert_eq!(process(&mut engine), TrackingVerdict::Good);
        assert_eq!(probes.track_calls.get(), track_calls_before);
        // Activity flags survived the reset.
        assert_eq!(probes.fuse_calls.get(), 0);
    }

    #[test]
    fn test_tracking_disabled_keeps_previous_verdict_and_counters() {
        let (mut engine, probes) = test_engine(10, vec![TrackingVerdict::Failed], vec![]);
        process(&mut engine);
        engine.turn_off_tracking();

        // The scripted failure is never consumed; previous Good stands and
        // fusion continues at the stale pose.
        for _ in 0..2 {
            assert_eq!(process(&mut engine), TrackingVerdict::Good);
        }
        assert_eq!(probes.track_calls.get(), 0);
        assert_eq!(engine.relocalisation_count(), 0);
        assert_eq!(probes.fuse_calls.get(), 3);
    }

    #[test]
    fn test_get_image_freeview_leaves_live_render_state_alone() {
        let (mut engine, _) = test_engine(10, vec![], vec![]);
        process(&mut engine);
        let live_pose = engine.live_render_state().pose.clone();
        assert!(engine.freeview_render_state().is_none());

        let freeview_pose = SE3::from_translation(Vector3::new(0.0, 1.0, 0.0));
        let img = engine.get_image(ImageType::ShadedSurface, Some(&freeview_pose), None);
        assert_eq!(img.width(), W);

        assert_eq!(engine.live_render_state().pose, live_pose);
        let freeview = engine.freeview_render_state().unwrap();
        assert_eq!(freeview.pose, freeview_pose);
    }

    #[test]
    fn test_get_image_input_passthrough() {
        let (mut engine, _) = test_engine(10, vec![], vec![]);
        // Before any frame: blank image of the configured size.
        let blank = engine.get_image(ImageType::InputColor, None, None);
        assert_eq!((blank.width(), blank.height()), (W, H));

        process(&mut engine);
        let color = engine.get_image(ImageType::InputColor, None, None);
        assert_eq!(color.get_pixel(0, 0).0, [120, 80, 40, 255]);
        let depth = engine.get_image(ImageType::InputDepth, None, None);
        assert_eq!((depth.width(), depth.height()), (W, H));
    }

    #[test]
    fn test_update_mesh_is_a_point_in_time_snapshot() {
        let (mut engine, _) = test_engine(10, vec![], vec![]);
        assert!(engine.mesh().is_none());

        process(&mut engine);
        let triangles_after_one = engine.update_mesh().num_triangles();
        assert!(triangles_after_one > 0);

        // Further fusion does not touch the stored snapshot.
        process(&mut engine);
        assert_eq!(engine.mesh().unwrap().num_triangles(), triangles_after_one);
        assert!(engine.update_mesh().num_triangles() > triangles_after_one);
    }
}
