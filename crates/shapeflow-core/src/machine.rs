use crate::config::SimConfig;
use crate::expr::Expr;
use crate::fixed::{f64_to_fixed64, fixed64_to_f64, Seconds};
use crate::id::{ConnectionId, GridPosition, InPort, OutPort};
use crate::shape::{Color, Item, Shape, ShapeDict, ShapeKind, ShapePackage, ShapeSpec};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_PAINT_COLOR: &str = "red";
pub const DEFAULT_DEGREES: i32 = 90;
pub const DEFAULT_CONDITION: &str = "shape.color == 'red'";
pub const DEFAULT_LOOP_COUNT: u32 = 3;
/// Most copies a looper emits per shape.
pub const MAX_LOOP_COUNT: u32 = 100;
pub const DEFAULT_PACK_SIZE: usize = 3;
pub const DEFAULT_TRANSFORM: &str = "shape.paint('red')";
pub const DEFAULT_FILTER: &str = "True";
pub const DEFAULT_FUNCTION_NAME: &str = "my_function";

// ---------------------------------------------------------------------------
// Machine kinds
// ---------------------------------------------------------------------------

/// The closed set of machine kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineKind {
    Source,
    Output,
    Conveyor,
    Painter,
    Cutter,
    Rotator,
    Stacker,
    Splitter,
    Looper,
    Function,
    Packer,
    Unpacker,
    DictPacker,
    Comprehension,
}

impl MachineKind {
    pub const ALL: [MachineKind; 14] = [
        MachineKind::Source,
        MachineKind::Output,
        MachineKind::Conveyor,
        MachineKind::Painter,
        MachineKind::Cutter,
        MachineKind::Rotator,
        MachineKind::Stacker,
        MachineKind::Splitter,
        MachineKind::Looper,
        MachineKind::Function,
        MachineKind::Packer,
        MachineKind::Unpacker,
        MachineKind::DictPacker,
        MachineKind::Comprehension,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MachineKind::Source => "source",
            MachineKind::Output => "output",
            MachineKind::Conveyor => "conveyor",
            MachineKind::Painter => "painter",
            MachineKind::Cutter => "cutter",
            MachineKind::Rotator => "rotator",
            MachineKind::Stacker => "stacker",
            MachineKind::Splitter => "splitter",
            MachineKind::Looper => "looper",
            MachineKind::Function => "function",
            MachineKind::Packer => "packer",
            MachineKind::Unpacker => "unpacker",
            MachineKind::DictPacker => "dict_packer",
            MachineKind::Comprehension => "comprehension",
        }
    }

    pub fn default_processing_time(&self, sim: &SimConfig) -> Seconds {
        match self {
            MachineKind::Conveyor => sim.conveyor_processing_time(),
            _ => sim.processing_time(),
        }
    }
}

/// Unknown machine type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown machine type '{0}'")]
pub struct UnknownMachineKind(pub String);

/// Case-insensitive; underscores are ignored so `DictPacker`, `dictpacker`
/// and `dict_packer` all name the same kind.
impl FromStr for MachineKind {
    type Err = UnknownMachineKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|k| k.name().replace('_', "") == folded)
            .ok_or_else(|| UnknownMachineKind(s.to_string()))
    }
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Kind-specific configuration
// ---------------------------------------------------------------------------

/// One stage of a Function machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub kind: MachineKind,
    #[serde(default)]
    pub config: MachineConfig,
}

/// Serializable kind-specific settings. Only the fields relevant to a kind
/// are set; everything else stays `None` and falls back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_type: Option<ShapeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_interval: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<StageSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ShapeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_count: Option<u32>,
}

// ---------------------------------------------------------------------------
// Processor variants
// ---------------------------------------------------------------------------

/// Spawns a fresh shape every `spawn_interval` seconds.
#[derive(Debug, Clone)]
pub struct SourceProcessor {
    pub shape_kind: ShapeKind,
    pub color: Color,
    pub spawn_interval: Seconds,
    /// Time since the last spawn. Reset to zero on every spawn.
    pub spawn_timer: Seconds,
}

/// Collects everything it receives and counts shapes matching `target`.
#[derive(Debug, Clone)]
pub struct OutputProcessor {
    pub target: Option<Shape>,
    pub required_count: u32,
    pub success_count: u32,
    pub collected: Vec<Item>,
}

impl OutputProcessor {
    pub fn is_satisfied(&self) -> bool {
        self.target.is_some() && self.success_count >= self.required_count
    }
}

#[derive(Debug, Clone)]
pub struct PainterProcessor {
    /// Kept as written; unknown names make painting a no-op.
    pub target_color: String,
}

#[derive(Debug, Clone)]
pub struct RotatorProcessor {
    pub degrees: i32,
}

/// Stacks one secondary item (fed through `input2`) on each primary shape.
#[derive(Debug, Clone, Default)]
pub struct StackerProcessor {
    pub secondary: VecDeque<Item>,
}

#[derive(Debug, Clone)]
pub struct SplitterProcessor {
    pub condition: Expr,
}

#[derive(Debug, Clone)]
pub struct LooperProcessor {
    pub loop_count: u32,
}

/// Runs each item through an ordered list of stage processors.
#[derive(Debug, Clone)]
pub struct FunctionProcessor {
    pub name: String,
    pub stages: Vec<Processor>,
}

/// Groups shapes into list packages of `pack_size`.
#[derive(Debug, Clone)]
pub struct PackerProcessor {
    pub pack_size: usize,
    pub pending: Vec<Shape>,
}

/// Groups shapes into dicts keyed `item_0`, `item_1`, ...
#[derive(Debug, Clone)]
pub struct DictPackerProcessor {
    pub target_size: usize,
    pub pending: ShapeDict,
}

/// Filters and transforms every element of a package.
#[derive(Debug, Clone)]
pub struct ComprehensionProcessor {
    pub transform: Expr,
    pub filter: Expr,
}

/// Kind-specific behavior and state. Dispatches via enum match.
#[derive(Debug, Clone)]
pub enum Processor {
    Source(SourceProcessor),
    Output(OutputProcessor),
    Conveyor,
    Painter(PainterProcessor),
    Cutter,
    Rotator(RotatorProcessor),
    Stacker(StackerProcessor),
    Splitter(SplitterProcessor),
    Looper(LooperProcessor),
    Function(FunctionProcessor),
    Packer(PackerProcessor),
    Unpacker,
    DictPacker(DictPackerProcessor),
    Comprehension(ComprehensionProcessor),
}

// ---------------------------------------------------------------------------
// Processor construction and config
// ---------------------------------------------------------------------------

impl Processor {
    /// Build a processor for `kind`, taking missing settings from defaults.
    pub fn from_config(kind: MachineKind, config: &MachineConfig, sim: &SimConfig) -> Self {
        match kind {
            MachineKind::Source => Processor::Source(SourceProcessor {
                shape_kind: config.shape_type.unwrap_or_default(),
                color: config.color.unwrap_or_default(),
                spawn_interval: config
                    .spawn_interval
                    .map(f64_to_fixed64)
                    .unwrap_or_else(|| sim.spawn_interval()),
                spawn_timer: Seconds::ZERO,
            }),
            MachineKind::Output => Processor::Output(OutputProcessor {
                target: config.target.as_ref().map(ShapeSpec::build),
                required_count: config.required_count.unwrap_or(1),
                success_count: 0,
                collected: Vec::new(),
            }),
            MachineKind::Conveyor => Processor::Conveyor,
            MachineKind::Painter => Processor::Painter(PainterProcessor {
                target_color: config
                    .target_color
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PAINT_COLOR.to_string()),
            }),
            MachineKind::Cutter => Processor::Cutter,
            MachineKind::Rotator => Processor::Rotator(RotatorProcessor {
                degrees: config.degrees.unwrap_or(DEFAULT_DEGREES),
            }),
            MachineKind::Stacker => Processor::Stacker(StackerProcessor::default()),
            MachineKind::Splitter => Processor::Splitter(SplitterProcessor {
                condition: Expr::lenient(config.condition.as_deref().unwrap_or(DEFAULT_CONDITION)),
            }),
            MachineKind::Looper => Processor::Looper(LooperProcessor {
                loop_count: config.loop_count.unwrap_or(DEFAULT_LOOP_COUNT).min(MAX_LOOP_COUNT),
            }),
            MachineKind::Function => Processor::Function(FunctionProcessor {
                name: config
                    .function_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FUNCTION_NAME.to_string()),
                stages: config
                    .stages
                    .iter()
                    .flatten()
                    .map(|stage| Processor::from_config(stage.kind, &stage.config, sim))
                    .collect(),
            }),
            MachineKind::Packer => Processor::Packer(PackerProcessor {
                pack_size: config.pack_size.unwrap_or(DEFAULT_PACK_SIZE).max(1),
                pending: Vec::new(),
            }),
            MachineKind::Unpacker => Processor::Unpacker,
            MachineKind::DictPacker => Processor::DictPacker(DictPackerProcessor {
                target_size: config.target_size.unwrap_or(DEFAULT_PACK_SIZE).max(1),
                pending: ShapeDict::new(),
            }),
            MachineKind::Comprehension => Processor::Comprehension(ComprehensionProcessor {
                transform: Expr::lenient(config.transform.as_deref().unwrap_or(DEFAULT_TRANSFORM)),
                filter: Expr::lenient(config.filter.as_deref().unwrap_or(DEFAULT_FILTER)),
            }),
        }
    }

    pub fn kind(&self) -> MachineKind {
        match self {
            Processor::Source(_) => MachineKind::Source,
            Processor::Output(_) => MachineKind::Output,
            Processor::Conveyor => MachineKind::Conveyor,
            Processor::Painter(_) => MachineKind::Painter,
            Processor::Cutter => MachineKind::Cutter,
            Processor::Rotator(_) => MachineKind::Rotator,
            Processor::Stacker(_) => MachineKind::Stacker,
            Processor::Splitter(_) => MachineKind::Splitter,
            Processor::Looper(_) => MachineKind::Looper,
            Processor::Function(_) => MachineKind::Function,
            Processor::Packer(_) => MachineKind::Packer,
            Processor::Unpacker => MachineKind::Unpacker,
            Processor::DictPacker(_) => MachineKind::DictPacker,
            Processor::Comprehension(_) => MachineKind::Comprehension,
        }
    }

    /// The settings needed to rebuild this processor (runtime state excluded).
    pub fn config(&self) -> MachineConfig {
        let mut cfg = MachineConfig::default();
        match self {
            Processor::Source(p) => {
                cfg.shape_type = Some(p.shape_kind);
                cfg.color = Some(p.color);
                cfg.spawn_interval = Some(fixed64_to_f64(p.spawn_interval));
            }
            Processor::Output(p) => {
                cfg.target = p.target.as_ref().map(ShapeSpec::from_shape);
                cfg.required_count = Some(p.required_count);
            }
            Processor::Painter(p) => cfg.target_color = Some(p.target_color.clone()),
            Processor::Rotator(p) => cfg.degrees = Some(p.degrees),
            Processor::Splitter(p) => cfg.condition = Some(p.condition.source().to_string()),
            Processor::Looper(p) => cfg.loop_count = Some(p.loop_count),
            Processor::Function(p) => {
                cfg.function_name = Some(p.name.clone());
                cfg.stages = Some(
                    p.stages
                        .iter()
                        .map(|s| StageSpec {
                            kind: s.kind(),
                            config: s.config(),
                        })
                        .collect(),
                );
            }
            Processor::Packer(p) => cfg.pack_size = Some(p.pack_size),
            Processor::DictPacker(p) => cfg.target_size = Some(p.target_size),
            Processor::Comprehension(p) => {
                cfg.transform = Some(p.transform.source().to_string());
                cfg.filter = Some(p.filter.source().to_string());
            }
            Processor::Conveyor | Processor::Cutter | Processor::Stacker(_) | Processor::Unpacker => {}
        }
        cfg
    }

    /// Clear runtime state (timers, counters, partial packs) but keep settings.
    pub fn reset_state(&mut self) {
        match self {
            Processor::Source(p) => p.spawn_timer = Seconds::ZERO,
            Processor::Output(p) => {
                p.success_count = 0;
                p.collected.clear();
            }
            Processor::Stacker(p) => p.secondary.clear(),
            Processor::Function(p) => p.stages.iter_mut().for_each(Processor::reset_state),
            Processor::Packer(p) => p.pending.clear(),
            Processor::DictPacker(p) => p.pending = ShapeDict::new(),
            _ => {}
        }
    }

    /// Whether the machine may take the next input item.
    pub fn ready(&self) -> bool {
        match self {
            Processor::Stacker(p) => !p.secondary.is_empty(),
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Processor::process
// ---------------------------------------------------------------------------

impl Processor {
    /// Transform one item into zero or more items. Never fails: evaluator
    /// errors and type mismatches degrade to pass-through.
    pub fn process(&mut self, item: Item) -> Vec<Item> {
        match self {
            Processor::Source(_) | Processor::Conveyor | Processor::Splitter(_) => vec![item],
            Processor::Output(p) => {
                if let (Item::Shape(shape), Some(target)) = (&item, &p.target)
                    && shape.matches(target)
                {
                    p.success_count += 1;
                }
                p.collected.push(item);
                Vec::new()
            }
            Processor::Painter(p) => match item {
                Item::Shape(mut shape) => {
                    shape.paint(&p.target_color);
                    vec![shape.into()]
                }
                other => vec![other],
            },
            Processor::Cutter => match item {
                Item::Shape(shape) => {
                    let (left, right) = shape.cut();
                    vec![left.into(), right.into()]
                }
                other => vec![other],
            },
            Processor::Rotator(p) => match item {
                Item::Shape(mut shape) => {
                    shape.rotate(p.degrees);
                    vec![shape.into()]
                }
                other => vec![other],
            },
            Processor::Stacker(p) => match item {
                Item::Shape(mut base) => {
                    match p.secondary.pop_front() {
                        Some(Item::Shape(top)) => {
                            base.stack(&top);
                        }
                        Some(other) => debug!(secondary = other.type_name(), "stacker discarded non-shape"),
                        None => {}
                    }
                    vec![base.into()]
                }
                other => vec![other],
            },
            Processor::Looper(p) => match item {
                Item::Shape(shape) => (0..p.loop_count)
                    .map(|i| {
                        let mut copy = shape.clone();
                        copy.set_tag("loop_index", i64::from(i));
                        copy.into()
                    })
                    .collect(),
                other => vec![other],
            },
            Processor::Function(p) => {
                let mut items = vec![item];
                for stage in &mut p.stages {
                    items = items.into_iter().flat_map(|i| stage.process(i)).collect();
                    if items.is_empty() {
                        return items;
                    }
                }
                items
            }
            Processor::Packer(p) => match item {
                Item::Shape(shape) => {
                    p.pending.push(shape);
                    if p.pending.len() >= p.pack_size {
                        vec![ShapePackage::list_of(std::mem::take(&mut p.pending)).into()]
                    } else {
                        Vec::new()
                    }
                }
                other => vec![other],
            },
            Processor::Unpacker => match item {
                Item::Package(package) => package.unpack().into_iter().map(Item::from).collect(),
                Item::Dict(dict) => dict.into_values().into_iter().map(Item::from).collect(),
                other => vec![other],
            },
            Processor::DictPacker(p) => match item {
                Item::Shape(shape) => {
                    let key = format!("item_{}", p.pending.len());
                    p.pending.set(key, shape);
                    if p.pending.len() >= p.target_size {
                        vec![std::mem::take(&mut p.pending).into()]
                    } else {
                        Vec::new()
                    }
                }
                other => vec![other],
            },
            Processor::Comprehension(p) => match item {
                Item::Package(package) => vec![p.apply(&package).into()],
                other => vec![other],
            },
        }
    }
}

impl ComprehensionProcessor {
    /// `[transform(s) for s in package if filter(s)]` as a new list.
    fn apply(&self, package: &ShapePackage) -> ShapePackage {
        let mut out = Vec::with_capacity(package.len());
        for shape in package.iter() {
            match self.filter.test(shape) {
                Ok(false) => continue,
                Ok(true) => match self.transform.transform(shape) {
                    Ok(transformed) => out.push(transformed),
                    Err(e) => {
                        warn!(expr = %self.transform, error = %e, "comprehension transform failed");
                        out.push(shape.clone());
                    }
                },
                Err(e) => {
                    warn!(expr = %self.filter, error = %e, "comprehension filter failed");
                    out.push(shape.clone());
                }
            }
        }
        ShapePackage::list_of(out)
    }
}

impl SplitterProcessor {
    /// Output port for an emitted item. Evaluator errors and non-shapes
    /// route as false.
    pub fn route(&self, item: &Item) -> OutPort {
        let verdict = match item {
            Item::Shape(shape) => self.condition.test(shape).unwrap_or_else(|e| {
                warn!(expr = %self.condition, error = %e, "splitter condition failed");
                false
            }),
            _ => false,
        };
        if verdict {
            OutPort::OutputTrue
        } else {
            OutPort::OutputFalse
        }
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Whether a machine is holding an item.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MachineState {
    #[default]
    Idle,
    Processing {
        elapsed: Seconds,
        item: Item,
    },
}

/// A node on the factory grid.
#[derive(Debug, Clone)]
pub struct Machine {
    /// Identifier the machine was declared under in a script.
    pub name: Option<String>,
    pub position: GridPosition,
    pub processor: Processor,
    pub enabled: bool,
    pub processing_time: Seconds,
    pub(crate) input_buffer: VecDeque<Item>,
    pub(crate) state: MachineState,
    pub(crate) outputs: Vec<ConnectionId>,
    pub(crate) inputs: Vec<ConnectionId>,
    /// Items emitted while the machine had no outgoing connection.
    pub(crate) output_buffer: Vec<Item>,
}

impl Machine {
    /// A machine with default settings for `kind`.
    pub fn new(kind: MachineKind, position: GridPosition) -> Self {
        Self::with_config(kind, position, &MachineConfig::default(), &SimConfig::default())
    }

    pub fn with_config(
        kind: MachineKind,
        position: GridPosition,
        config: &MachineConfig,
        sim: &SimConfig,
    ) -> Self {
        Self::from_processor(
            Processor::from_config(kind, config, sim),
            position,
            kind.default_processing_time(sim),
        )
    }

    pub fn from_processor(processor: Processor, position: GridPosition, processing_time: Seconds) -> Self {
        Self {
            name: None,
            position,
            processor,
            enabled: true,
            processing_time,
            input_buffer: VecDeque::new(),
            state: MachineState::Idle,
            outputs: Vec::new(),
            inputs: Vec::new(),
            output_buffer: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(&self) -> MachineKind {
        self.processor.kind()
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.state, MachineState::Processing { .. })
    }

    pub fn input_buffer(&self) -> &VecDeque<Item> {
        &self.input_buffer
    }

    pub fn output_buffer(&self) -> &[Item] {
        &self.output_buffer
    }

    pub fn take_output_buffer(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.output_buffer)
    }

    pub fn outputs(&self) -> &[ConnectionId] {
        &self.outputs
    }

    pub fn inputs(&self) -> &[ConnectionId] {
        &self.inputs
    }

    pub fn as_output(&self) -> Option<&OutputProcessor> {
        match &self.processor {
            Processor::Output(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_output_mut(&mut self) -> Option<&mut OutputProcessor> {
        match &mut self.processor {
            Processor::Output(p) => Some(p),
            _ => None,
        }
    }

    /// Accept an item arriving on `port`.
    pub fn receive(&mut self, item: Item, port: InPort) {
        match (&mut self.processor, port) {
            (Processor::Stacker(p), InPort::Input2) => p.secondary.push_back(item),
            _ => self.input_buffer.push_back(item),
        }
    }

    /// Process and intake phases of one tick. Returns the items emitted by
    /// a finished process paired with their output port, or `None` when no
    /// process finished. Each result of the processor is emitted on its own;
    /// packages travel whole.
    pub(crate) fn step(&mut self, dt: Seconds) -> Option<Vec<(OutPort, Item)>> {
        let mut finished = None;

        let done = match &mut self.state {
            MachineState::Processing { elapsed, .. } => {
                *elapsed = elapsed.saturating_add(dt);
                *elapsed >= self.processing_time
            }
            MachineState::Idle => false,
        };
        if done && let MachineState::Processing { item, .. } = std::mem::take(&mut self.state) {
            let results = self.processor.process(item);
            finished = Some(self.route(results));
        }

        if matches!(self.state, MachineState::Idle)
            && self.processor.ready()
            && let Some(item) = self.input_buffer.pop_front()
        {
            self.state = MachineState::Processing {
                elapsed: Seconds::ZERO,
                item,
            };
        }

        finished
    }

    fn route(&self, results: Vec<Item>) -> Vec<(OutPort, Item)> {
        let items = results.into_iter();
        match &self.processor {
            Processor::Splitter(splitter) => items.map(|item| (splitter.route(&item), item)).collect(),
            _ => items.map(|item| (OutPort::Output, item)).collect(),
        }
    }

    /// Source spawn phase. Returns a fresh shape when the interval elapsed.
    pub(crate) fn spawn(&mut self, dt: Seconds) -> Option<Shape> {
        let Processor::Source(source) = &mut self.processor else {
            return None;
        };
        source.spawn_timer = source.spawn_timer.saturating_add(dt);
        if source.spawn_timer >= source.spawn_interval {
            source.spawn_timer = Seconds::ZERO;
            return Some(Shape::new(source.shape_kind, source.color));
        }
        None
    }

    /// Drop buffered items, processing state and kind-specific runtime state.
    pub fn reset(&mut self) {
        self.input_buffer.clear();
        self.output_buffer.clear();
        self.state = MachineState::Idle;
        self.processor.reset_state();
    }
}
