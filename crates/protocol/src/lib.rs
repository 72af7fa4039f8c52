//! Wire types for the Borealis system detection service.
//!
//! Every detection response is built from these types. They carry no
//! probing logic of their own; the detector crate fills them in and the
//! server crate serializes them. Metric fields that can be absent on a
//! given host use [`Metric`], which serializes the explicit `"n/a"`
//! sentinel instead of a misleading zero.

mod metric;
mod platform;
mod responses;
mod telemetry;

pub use metric::{Metric, SENTINEL};
pub use platform::{AcceleratorState, Device, DeviceType, OsAlias, PlatformInfo};
pub use responses::{
    CompleteDetection, CpuDetection, DiskDetection, EnvironmentDetection, GpuDetection,
    HealthResponse, LegacyInfo, MemoryDetection, NetworkDetection, RealtimeDetection,
    RealtimeMetrics, RootResponse, SystemSummary,
};
pub use telemetry::{
    CpuSection, DiskSection, DiskUsage, EnvironmentInfo, GpuDevice, GpuSummary, InterfaceAddress,
    InterfaceStats, MemorySection, NetworkIo, NetworkSection, Partition, SwapMemory,
    VirtualMemory,
};
