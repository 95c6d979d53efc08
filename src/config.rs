//! Compiler configuration (component K): the knobs a caller can set for one compilation, read
//! once by the pipeline driver and threaded explicitly through every pass invocation rather than
//! stashed in a global (§9's design note: "the current arena config is not global"). Grounded in
//! the teacher's settings-table idiom, simplified here to a flat `serde`-deserializable struct
//! since this system has no per-target-ISA flag matrix to model.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub dynamic_scheduling: bool,
    pub per_thread_stack_size: u32,
    pub per_subgroup_stack_size: u32,
    pub target_spirv_version: SpirvVersion,
    pub specialization: SpecializationConfig,
    pub lower: LoweringConfig,
    pub hacks: HacksConfig,
    pub logging: LoggingConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dynamic_scheduling: false,
            per_thread_stack_size: 4096,
            per_subgroup_stack_size: 0,
            target_spirv_version: SpirvVersion::default(),
            specialization: SpecializationConfig::default(),
            lower: LoweringConfig::default(),
            hacks: HacksConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct SpirvVersion {
    pub major: u8,
    pub minor: u8,
}

impl Default for SpirvVersion {
    fn default() -> Self {
        SpirvVersion { major: 1, minor: 4 }
    }
}

impl SpirvVersion {
    /// The version word as it appears in a SPIR-V module header: `0 | major << 16 | minor << 8 | 0`.
    pub fn as_word(self) -> u32 {
        ((self.major as u32) << 16) | ((self.minor as u32) << 8)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SpecializationConfig {
    pub subgroup_size: Option<u32>,
    pub entry_point: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoweringConfig {
    pub decay_ptrs: bool,
    pub simt_to_explicit_simd: bool,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            decay_ptrs: false,
            simt_to_explicit_simd: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct HacksConfig {
    pub force_join_point_lifting: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub skip_internal: bool,
    pub skip_generated: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            skip_internal: true,
            skip_generated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_spirv_1_4() {
        let cfg = CompilerConfig::default();
        assert_eq!(cfg.target_spirv_version, SpirvVersion { major: 1, minor: 4 });
        assert_eq!(cfg.target_spirv_version.as_word(), 0x0001_0400);
    }

    #[test]
    fn deserializes_from_partial_toml() {
        let cfg: CompilerConfig = toml::from_str(
            r#"
            dynamic_scheduling = true

            [specialization]
            entry_point = "main"
            "#,
        )
        .expect("partial config should deserialize using field defaults");
        assert!(cfg.dynamic_scheduling);
        assert_eq!(cfg.specialization.entry_point.as_deref(), Some("main"));
        assert_eq!(cfg.per_thread_stack_size, 4096);
    }
}
