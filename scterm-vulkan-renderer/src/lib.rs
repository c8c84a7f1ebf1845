//! Vulkan context for scterm: instance, optional validation messenger, a presentable
//! surface for the backend's window, physical device selection and a logical device.
//!
//! No pixel content is produced here.

use ash::extensions::khr::Surface;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use scterm_core::RendererConfig;
use thiserror::Error;
use tracing::info;

mod device;
mod instance;

pub use device::{device_type_score, QueueFamilyIndices};
pub use instance::VulkanInstance;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("No physical device can render to and present on the window surface")]
    NoSuitableDevice,
}

pub struct VulkanContext {
    device: ash::Device,
    #[allow(dead_code)]
    graphics_queue: vk::Queue,
    #[allow(dead_code)]
    present_queue: vk::Queue,
    queue_family_indices: QueueFamilyIndices,
    physical_device: vk::PhysicalDevice,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    // Dropped last: destroys the messenger and the instance.
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Builds the full context for `window`, which must stay alive until the context is dropped.
    pub fn new<W>(config: &RendererConfig, window: &W) -> Result<Self, anyhow::Error>
    where
        W: HasRawDisplayHandle + HasRawWindowHandle,
    {
        let display_handle = window.raw_display_handle();
        let instance = VulkanInstance::new(config, display_handle)?;

        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                display_handle,
                window.raw_window_handle(),
                None,
            )?
        };
        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        info!("Vulkan surface created.");

        let selected = device::select_physical_device(&instance.instance, &surface_loader, surface)
            .and_then(|(physical_device, indices)| {
                device::create_logical_device(&instance.instance, physical_device, &indices)
                    .map(|created| (physical_device, indices, created))
            });
        let (physical_device, queue_family_indices, (device, graphics_queue, present_queue)) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let properties = unsafe { instance.instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { std::ffi::CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();
        info!(
            "Vulkan context ready on {}. Graphics: {:?}, Present: {:?}",
            device_name, queue_family_indices.graphics_family, queue_family_indices.present_family
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            queue_family_indices,
            physical_device,
            surface_loader,
            surface,
            instance,
        })
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn queue_family_indices(&self) -> QueueFamilyIndices {
        self.queue_family_indices
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn has_debug_messenger(&self) -> bool {
        self.instance.has_debug_messenger()
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            // Destroy in reverse order of creation dependency
            if let Err(e) = self.device.device_wait_idle() {
                tracing::warn!("vkDeviceWaitIdle failed during teardown: {:?}", e);
            }
            self.device.destroy_device(None);
            info!("Vulkan logical device destroyed.");

            self.surface_loader.destroy_surface(self.surface, None);
            info!("Vulkan surface destroyed.");
        }
    }
}
