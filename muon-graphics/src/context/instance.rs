//! Vulkan instance ownership: library entry, instance, debug messenger.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::vk;
use muon_core::WindowSurface;
use tracing::{debug, error, info, trace, warn};

use crate::error::{GraphicsError, Result};

/// Compile-time gate for the debug messenger and validation layer.
pub const DEBUG_ENABLED: bool = cfg!(debug_assertions);

const ENGINE_NAME: &str = "Muon";
const VALIDATION_LAYER_NAME: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

pub struct Instance {
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Creates the instance with the window system's required extensions plus
    /// the surface-capability and colorspace extensions the renderer probes
    /// through. Validation-layer absence is logged, never fatal.
    pub fn new(window: &dyn WindowSurface) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|err| GraphicsError::Initialization(format!("failed to load vulkan library: {err}")))?;

        let app_name = CString::new(ENGINE_NAME).expect("static engine name");
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&app_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extensions: Vec<*const c_char> = window
            .required_extensions()
            .into_iter()
            .map(CStr::as_ptr)
            .collect();
        extensions.push(vk::KhrGetSurfaceCapabilities2Fn::name().as_ptr());
        extensions.push(vk::ExtSwapchainColorspaceFn::name().as_ptr());
        if DEBUG_ENABLED {
            extensions.push(DebugUtils::name().as_ptr());
        }

        Self::check_extension_support(&entry, &extensions)?;

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions);

        let validation_layer = [VALIDATION_LAYER_NAME.as_ptr()];
        if DEBUG_ENABLED {
            if Self::validation_layer_available(&entry)? {
                create_info = create_info.enabled_layer_names(&validation_layer);
            } else {
                warn!("validation layer is not available");
            }
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(GraphicsError::from)?;
        debug!("created instance");

        let debug_messenger = if DEBUG_ENABLED {
            Some(Self::create_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_messenger,
        })
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn raw(&self) -> &ash::Instance {
        &self.instance
    }

    fn check_extension_support(entry: &ash::Entry, required: &[*const c_char]) -> Result<()> {
        let available = entry
            .enumerate_instance_extension_properties(None)
            .map_err(GraphicsError::from)?;

        for &required_ptr in required {
            let required_name = unsafe { CStr::from_ptr(required_ptr) };
            let found = available.iter().any(|extension| {
                let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
                name == required_name
            });
            if !found {
                return Err(GraphicsError::MissingExtension(
                    required_name.to_string_lossy().into_owned(),
                ));
            }
        }

        Ok(())
    }

    fn validation_layer_available(entry: &ash::Entry) -> Result<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(GraphicsError::from)?;

        Ok(layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name == VALIDATION_LAYER_NAME
        }))
    }

    fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let loader = DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .map_err(GraphicsError::from)?;
        debug!("created debug messenger");

        Ok((loader, messenger))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_messenger.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        debug!("destroyed instance");
    }
}

/// Routes validation messages into the host log at matching severity.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if (*callback_data).p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        CStr::from_ptr((*callback_data).p_message).to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!(target: "vulkan", "[{message_type:?}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!(target: "vulkan", "[{message_type:?}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            info!(target: "vulkan", "[{message_type:?}] {message}");
        }
        _ => {
            trace!(target: "vulkan", "[{message_type:?}] {message}");
        }
    }

    vk::FALSE
}
