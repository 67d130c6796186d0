use std::ffi::CStr;

use ash::{vk, Device, Entry, Instance};

use crate::error::{GpuError, VkContext};

/// Instance, device and graphics queue for the single accelerator in use.
pub(crate) struct GpuContext {
    _entry: Entry,
    pub instance: Instance,
    pub device: Device,
    pub queue: vk::Queue,
    pub queue_family: u32,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub device_name: String,
}

impl GpuContext {
    pub fn new() -> Result<Self, GpuError> {
        let entry = unsafe { Entry::load()? };

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"metalshade")
            .api_version(vk::make_api_version(0, 1, 2, 0));
        let create_info = vk::InstanceCreateInfo::default().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&create_info, None) }
            .vk_context("vkCreateInstance")?;

        let physical_device = unsafe { instance.enumerate_physical_devices() }
            .vk_context("vkEnumeratePhysicalDevices")?
            .first()
            .copied()
            .ok_or(GpuError::NoPhysicalDevice)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let queue_family = unsafe {
            instance.get_physical_device_queue_family_properties(physical_device)
        }
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .ok_or(GpuError::NoQueueFamily)? as u32;

        let priorities = [1.0];
        let queue_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities);
        let device_info =
            vk::DeviceCreateInfo::default().queue_create_infos(std::slice::from_ref(&queue_info));
        let device = unsafe { instance.create_device(physical_device, &device_info, None) }
            .vk_context("vkCreateDevice")?;
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        tracing::debug!(
            gpu = %device_name,
            queue_family,
            memory_types = memory_properties.memory_type_count,
            "initialised Vulkan device"
        );

        Ok(Self {
            _entry: entry,
            instance,
            device,
            queue,
            queue_family,
            memory_properties,
            device_name,
        })
    }

    /// Like [`find_memory_type`], but a miss is an error.
    pub fn memory_type(
        &self,
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    ) -> Result<u32, GpuError> {
        find_memory_type(&self.memory_properties, type_bits, flags)
            .ok_or(GpuError::NoMemoryType { type_bits, flags })
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Returns the first memory type allowed by `type_bits` that carries every flag
/// in `flags`.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..properties.memory_type_count).find(|&index| {
        type_bits & (1 << index) != 0
            && properties.memory_types[index as usize]
                .property_flags
                .contains(flags)
    })
}
