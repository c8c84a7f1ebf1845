use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use scterm_core::RendererConfig;
use tracing::{debug, info, warn};

pub(crate) const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = *p_callback_data;
    let message_id_number = callback_data.message_id_number;

    let message_id_name = if callback_data.p_message_id_name.is_null() {
        std::borrow::Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            tracing::debug!(target: "vulkan", "type: {:?}, id: {} ({}), message: {}", message_type, message_id_name, message_id_number, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::info!(target: "vulkan", "type: {:?}, id: {} ({}), message: {}", message_type, message_id_name, message_id_number, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "vulkan", "type: {:?}, id: {} ({}), message: {}", message_type, message_id_name, message_id_number, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "vulkan", "type: {:?}, id: {} ({}), message: {}", message_type, message_id_name, message_id_number, message);
        }
        _ => {
            tracing::trace!(target: "vulkan", "severity: {:?}, type: {:?}, id: {} ({}), message: {}", message_severity, message_type, message_id_name, message_id_number, message);
        }
    }
    vk::FALSE
}

fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

/// Whether the loader reports `VK_LAYER_KHRONOS_validation`.
pub(crate) fn validation_layer_available(entry: &ash::Entry) -> bool {
    match entry.enumerate_instance_layer_properties() {
        Ok(layers) => layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER),
        Err(e) => {
            warn!("Failed to enumerate Vulkan instance layers: {:?}", e);
            false
        }
    }
}

/// Loader entry, instance and optional debug messenger. Destroyed in reverse order on drop.
pub struct VulkanInstance {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Creates an instance with the surface extensions `display` needs. Validation is
    /// enabled only when requested and the layer is actually installed.
    pub fn new(config: &RendererConfig, display: RawDisplayHandle) -> Result<Self, anyhow::Error> {
        let entry = unsafe { ash::Entry::load()? };

        let app_name = CString::new(config.application_name.as_str())?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&app_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        let validation = config.validation_layers && validation_layer_available(&entry);
        if config.validation_layers && !validation {
            warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed; continuing without it.");
        }

        let mut instance_extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)?.to_vec();
        let mut enabled_layer_names: Vec<*const c_char> = Vec::new();
        if validation {
            instance_extensions.push(DebugUtils::name().as_ptr());
            enabled_layer_names.push(VALIDATION_LAYER.as_ptr());
        }

        let mut debug_create_info = messenger_create_info();
        let mut instance_create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&instance_extensions)
            .enabled_layer_names(&enabled_layer_names);
        if validation {
            // Also covers messages emitted by vkCreateInstance/vkDestroyInstance.
            instance_create_info = instance_create_info.push_next(&mut debug_create_info);
        }

        let instance = unsafe { entry.create_instance(&instance_create_info, None)? };
        info!("Vulkan instance created ({} extensions, validation {}).", instance_extensions.len(), validation);

        let debug = if validation {
            let loader = DebugUtils::new(&entry, &instance);
            match unsafe { loader.create_debug_utils_messenger(&messenger_create_info(), None) } {
                Ok(messenger) => {
                    debug!("Vulkan debug messenger created.");
                    Some((loader, messenger))
                }
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        Ok(Self { entry, instance, debug })
    }

    pub fn has_debug_messenger(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
                info!("Vulkan debug messenger destroyed.");
            }
            self.instance.destroy_instance(None);
            info!("Vulkan instance destroyed.");
        }
    }
}
