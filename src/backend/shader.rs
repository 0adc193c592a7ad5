// Shader module loading
//
// Shaders are compiled SPIR-V blobs read from the shaders/ directory.
// Decoding goes through ash::util::read_spv, which copies the bytes into
// properly aligned words and rejects blobs whose length is not a multiple
// of the 4-byte word size.

use ash::util::read_spv;
use ash::vk;
use std::fs::File;
use std::path::Path;

use super::error::VulkanError;
use super::VulkanDevice;

/// Read a compiled SPIR-V blob from disk as 32-bit words.
pub fn load_shader(path: &Path) -> Result<Vec<u32>, VulkanError> {
    let mut file = File::open(path).map_err(|source| VulkanError::ShaderLoad {
        path: path.display().to_string(),
        source,
    })?;

    read_spv(&mut file).map_err(|source| VulkanError::ShaderLoad {
        path: path.display().to_string(),
        source,
    })
}

/// Create a shader module from SPIR-V words.
pub fn create_shader_module(
    device: &VulkanDevice,
    code: &[u32],
) -> Result<vk::ShaderModule, VulkanError> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);

    unsafe { device.device.create_shader_module(&create_info, None) }.map_err(|result| {
        VulkanError::ResourceCreation {
            what: "shader module",
            result,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_blob(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn truncated_blob_is_rejected() {
        // 13 bytes is not a whole number of SPIR-V words.
        let path = write_blob("vk-triangle-truncated.spv", &[0u8; 13]);
        let err = load_shader(&path).unwrap_err();
        assert!(matches!(err, VulkanError::ShaderLoad { .. }));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn word_aligned_blob_loads_as_words() {
        // SPIR-V magic number, little endian.
        let path = write_blob("vk-triangle-magic.spv", &[0x03, 0x02, 0x23, 0x07]);
        let words = load_shader(&path).unwrap();
        assert_eq!(words, vec![0x0723_0203]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_reports_its_path() {
        let path = Path::new("shaders/does-not-exist.spv");
        let err = load_shader(path).unwrap_err();
        assert!(err.to_string().contains("does-not-exist.spv"));
    }
}
