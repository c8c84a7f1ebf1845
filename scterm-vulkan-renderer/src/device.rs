use std::collections::BTreeSet;
use std::ffi::CStr;
use std::os::raw::c_char;

use ash::extensions::khr::{Surface, Swapchain};
use ash::vk;
use tracing::info;

use crate::RendererError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }
}

/// Preference of a device type; higher wins. Every type is usable.
pub fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 500,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        _ => 1,
    }
}

fn find_queue_families(
    instance: &ash::Instance,
    surface_loader: &Surface,
    surface: vk::SurfaceKHR,
    pdevice: vk::PhysicalDevice,
) -> Result<QueueFamilyIndices, anyhow::Error> {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
    let mut indices = QueueFamilyIndices::default();

    for (i, queue_family) in queue_families.iter().enumerate() {
        let index = i as u32;
        if queue_family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && indices.graphics_family.is_none() {
            indices.graphics_family = Some(index);
        }
        let presentation_support =
            unsafe { surface_loader.get_physical_device_surface_support(pdevice, index, surface)? };
        if presentation_support && indices.present_family.is_none() {
            indices.present_family = Some(index);
        }
        if indices.is_complete() {
            break;
        }
    }
    Ok(indices)
}

fn supports_swapchain(instance: &ash::Instance, pdevice: vk::PhysicalDevice) -> Result<bool, anyhow::Error> {
    let available_extensions = unsafe { instance.enumerate_device_extension_properties(pdevice)? };
    Ok(available_extensions
        .iter()
        .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == Swapchain::name()))
}

/// Picks the highest scoring device that can draw and present to `surface`.
pub(crate) fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &Surface,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilyIndices), anyhow::Error> {
    let physical_devices = unsafe { instance.enumerate_physical_devices()? };
    info!("Found {} physical devices.", physical_devices.len());

    let mut best: Option<(u32, vk::PhysicalDevice, QueueFamilyIndices)> = None;
    for pdevice in physical_devices {
        let properties = unsafe { instance.get_physical_device_properties(pdevice) };
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();

        if !supports_swapchain(instance, pdevice)? {
            info!("Device {} does not support {:?}", device_name, Swapchain::name());
            continue;
        }
        let indices = find_queue_families(instance, surface_loader, surface, pdevice)?;
        if !indices.is_complete() {
            info!(
                "Device {} lacks required queue families. Graphics: {:?}, Present: {:?}",
                device_name, indices.graphics_family, indices.present_family
            );
            continue;
        }

        let score = device_type_score(properties.device_type);
        info!("Device {} is suitable (score {}).", device_name, score);
        if best.map_or(true, |(best_score, _, _)| score > best_score) {
            best = Some((score, pdevice, indices));
        }
    }

    let (_, pdevice, indices) = best.ok_or(RendererError::NoSuitableDevice)?;
    Ok((pdevice, indices))
}

pub(crate) fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    indices: &QueueFamilyIndices,
) -> Result<(ash::Device, vk::Queue, vk::Queue), anyhow::Error> {
    let graphics_family_idx = indices.graphics_family.ok_or(RendererError::NoSuitableDevice)?;
    let present_family_idx = indices.present_family.ok_or(RendererError::NoSuitableDevice)?;
    let unique_queue_families: BTreeSet<u32> = [graphics_family_idx, present_family_idx].into_iter().collect();

    let queue_priorities = [1.0f32];
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_queue_families
        .into_iter()
        .map(|queue_family_index| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(queue_family_index)
                .queue_priorities(&queue_priorities)
                .build()
        })
        .collect();

    let physical_device_features = vk::PhysicalDeviceFeatures::builder();
    let device_extension_names: [*const c_char; 1] = [Swapchain::name().as_ptr()];

    let device_create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&physical_device_features)
        .enabled_extension_names(&device_extension_names);

    let device = unsafe { instance.create_device(physical_device, &device_create_info, None)? };
    info!("Logical device created.");

    let graphics_queue = unsafe { device.get_device_queue(graphics_family_idx, 0) };
    let present_queue = unsafe { device.get_device_queue(present_family_idx, 0) };
    Ok((device, graphics_queue, present_queue))
}
