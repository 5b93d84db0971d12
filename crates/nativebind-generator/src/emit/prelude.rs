//! Runtime prelude emitted at the top of every unit.
//!
//! The struct layouts here mirror `nativebind_runtime::abi`.

use nativebind_core::StatusCode;

use super::SourceWriter;
use crate::GeneratorOptions;

const INCLUDES: &[&str] = &[
    "<stddef.h>",
    "<stdint.h>",
    "<string.h>",
    "<exception>",
    "<new>",
    "<stdexcept>",
    "<string>",
    "<vector>",
];

const EXPORT: &str = r#"#if defined(_WIN32)
#define NB_EXPORT __declspec(dllexport)
#else
#define NB_EXPORT __attribute__((visibility("default")))
#endif
"#;

const TYPES: &str = r#"#define NB_KIND_MAX 128
#define NB_MESSAGE_MAX 512

typedef void (*nb_release)(void*);

struct nb_pointer {
  void* address;
  intptr_t position;
  intptr_t limit;
  intptr_t capacity;
  nb_release owner;
};

struct nb_env {
  void* host;
  intptr_t detail[3];
  char kind[NB_KIND_MAX];
  char message[NB_MESSAGE_MAX];
};
"#;

const HELPERS: &str = r#"static inline void nb_copy_text(char* dst, size_t size, const char* src) {
  if (src == NULL) src = "";
  size_t len = strlen(src);
  if (len >= size) len = size - 1;
  memcpy(dst, src, len);
  dst[len] = '\0';
}

static inline nb_status nb_raise(nb_env* env, nb_status status, const char* kind, const char* message) {
  if (env != NULL) {
    nb_copy_text(env->kind, NB_KIND_MAX, kind);
    nb_copy_text(env->message, NB_MESSAGE_MAX, message);
  }
  return status;
}

static inline nb_status nb_fail_null(nb_env* env) {
  return nb_raise(env, NB_NULL_REFERENCE, "NullPointerException", "This pointer address is NULL.");
}

static inline nb_status nb_fail_range(nb_env* env, intptr_t position, intptr_t limit, intptr_t requested) {
  if (env != NULL) {
    env->detail[0] = position;
    env->detail[1] = limit;
    env->detail[2] = requested;
  }
  return NB_INVALID_RANGE;
}

static inline nb_status nb_fail_index(nb_env* env, intptr_t index, intptr_t size) {
  if (env != NULL) {
    env->detail[0] = index;
    env->detail[1] = size;
    env->detail[2] = 0;
  }
  return NB_INDEX_OUT_OF_RANGE;
}

static inline bool nb_range_ok(const nb_pointer* p) {
  return p == NULL || (p->position >= 0 && p->position <= p->limit);
}

template <typename T> static inline T* nb_ptr(const nb_pointer* p) {
  return p == NULL || p->address == NULL ? NULL : (T*)p->address + p->position;
}

template <typename F> static inline F nb_fn(const nb_pointer* p) {
  return p == NULL ? NULL : reinterpret_cast<F>(p->address);
}

static inline void nb_set_pointer(nb_pointer* p, const void* address, intptr_t count, nb_release owner) {
  if (p == NULL) return;
  p->address = const_cast<void*>(address);
  p->position = 0;
  p->limit = address == NULL ? 0 : count;
  p->capacity = p->limit;
  p->owner = address == NULL ? NULL : owner;
}

template <typename T> static void nb_release_object(void* p) {
  delete (T*)p;
}

template <typename T> static void nb_release_array(void* p) {
  delete[] (T*)p;
}

static inline void nb_set_string(nb_pointer* p, const char* s) {
  if (s == NULL) {
    nb_set_pointer(p, NULL, 0, NULL);
    return;
  }
  size_t len = strlen(s);
  char* copy = new (std::nothrow) char[len + 1];
  if (copy != NULL) memcpy(copy, s, len + 1);
  nb_set_pointer(p, copy, (intptr_t)len, &nb_release_array<char>);
}

static inline void nb_set_string(nb_pointer* p, const std::string& s) {
  char* copy = new (std::nothrow) char[s.size() + 1];
  if (copy != NULL) {
    memcpy(copy, s.data(), s.size());
    copy[s.size()] = '\0';
  }
  nb_set_pointer(p, copy, (intptr_t)s.size(), &nb_release_array<char>);
}

template <typename T> static void nb_set_vector(nb_pointer* p, const std::vector<T>& v) {
  T* copy = new (std::nothrow) T[v.empty() ? 1 : v.size()];
  if (copy != NULL) {
    for (size_t i = 0; i < v.size(); i++) copy[i] = v[i];
  }
  nb_set_pointer(p, copy, (intptr_t)v.size(), &nb_release_array<T>);
}

template <typename T> struct nb_vector_adapter {
  std::vector<T> value;

  explicit nb_vector_adapter(const nb_pointer* p) {
    T* base = nb_ptr<T>(p);
    if (base != NULL) value.assign(base, base + (p->limit - p->position));
  }

  void read_back(nb_pointer* p) {
    if (p == NULL) return;
    intptr_t size = (intptr_t)value.size();
    T* base = nb_ptr<T>(p);
    if (base != NULL && size <= p->capacity - p->position) {
      for (intptr_t i = 0; i < size; i++) base[i] = value[(size_t)i];
      p->limit = p->position + size;
      return;
    }
    nb_set_vector(p, value);
  }
};

struct nb_string_adapter {
  std::string value;

  explicit nb_string_adapter(const char* s) : value(s == NULL ? "" : s) {}

  explicit nb_string_adapter(const nb_pointer* p) {
    const char* base = nb_ptr<const char>(p);
    if (base != NULL) value.assign(base, (size_t)(p->limit - p->position));
  }

  void read_back(nb_pointer* p) {
    if (p == NULL) return;
    intptr_t size = (intptr_t)value.size();
    char* base = nb_ptr<char>(p);
    if (base != NULL && size < p->capacity - p->position) {
      memcpy(base, value.data(), (size_t)size);
      base[size] = '\0';
      p->limit = p->position + size;
      return;
    }
    nb_set_string(p, value);
  }
};
"#;

const HOST_RUNTIME: &str = r#"struct nb_host_runtime {
  void* host;
  int (*is_attached)(void* host);
  int (*attach)(void* host);
  void (*detach)(void* host);
  nb_status (*dispatch)(void* host, nb_env* env, uint64_t callback, int32_t slot, void** args, void* ret);
};

static nb_host_runtime nb_runtime = { NULL, NULL, NULL, NULL, NULL };

struct nb_attach_guard {
  bool ok;

  static int& depth() {
    static thread_local int d = 0;
    return d;
  }

  static bool& attached_here() {
    static thread_local bool a = false;
    return a;
  }

  nb_attach_guard() : ok(false) {
    if (nb_runtime.dispatch == NULL) return;
    if (depth() == 0 && nb_runtime.is_attached != NULL && !nb_runtime.is_attached(nb_runtime.host)) {
      if (nb_runtime.attach == NULL || !nb_runtime.attach(nb_runtime.host)) return;
      attached_here() = true;
    }
    depth()++;
    ok = true;
  }

  ~nb_attach_guard() {
    if (!ok) return;
    if (--depth() == 0 && attached_here()) {
      attached_here() = false;
      if (nb_runtime.detach != NULL) nb_runtime.detach(nb_runtime.host);
    }
  }

private:
  nb_attach_guard(const nb_attach_guard&);
  nb_attach_guard& operator=(const nb_attach_guard&);
};
"#;

/// The exported function installing the host runtime table.
pub fn set_runtime_symbol(options: &GeneratorOptions) -> String {
    options.symbol(&["set_runtime"])
}

/// Emit the prelude: includes, status codes, ABI structs, helpers, the host
/// runtime table, and the thread attach guard.
pub fn emit_prelude(options: &GeneratorOptions) -> String {
    let mut w = SourceWriter::new();
    w.line("// Generated by nativebind. Do not edit.");
    for include in INCLUDES {
        w.line(&format!("#include {include}"));
    }
    for include in &options.extra_includes {
        w.line(&format!("#include {include}"));
    }
    w.blank();
    w.raw(EXPORT);
    w.blank();
    w.line("typedef int32_t nb_status;");
    for code in StatusCode::ALL {
        w.line(&format!("#define {} {}", code.c_name(), i32::from(code)));
    }
    w.raw(TYPES);
    w.blank();
    w.raw(HELPERS);
    w.blank();
    w.raw(HOST_RUNTIME);
    w.blank();
    w.open(&format!(
        "extern \"C\" NB_EXPORT void {}(const nb_host_runtime* runtime)",
        set_runtime_symbol(options)
    ));
    w.open("if (runtime == NULL)");
    w.line("nb_host_runtime empty = { NULL, NULL, NULL, NULL, NULL };");
    w.line("nb_runtime = empty;");
    w.reopen("} else {");
    w.line("nb_runtime = *runtime;");
    w.close();
    w.close();
    w.blank();
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_macros_match_codes() {
        let prelude = emit_prelude(&GeneratorOptions::default());
        assert!(prelude.contains("#define NB_OK 0\n"));
        assert!(prelude.contains("#define NB_INDEX_OUT_OF_RANGE 3\n"));
        assert!(prelude.contains("#define NB_HOST_FAILURE 5\n"));
    }

    #[test]
    fn extra_includes_follow_standard_ones() {
        let options = GeneratorOptions::default().with_include("\"mylib.h\"");
        let prelude = emit_prelude(&options);
        let std_pos = prelude.find("#include <vector>").unwrap();
        let lib_pos = prelude.find("#include \"mylib.h\"").unwrap();
        assert!(std_pos < lib_pos);
    }

    #[test]
    fn runtime_installer_uses_prefix() {
        let options = GeneratorOptions::default().with_symbol_prefix("cv");
        assert!(emit_prelude(&options).contains("void cv_set_runtime(const nb_host_runtime* runtime) {"));
    }

    #[test]
    fn layouts_match_runtime_buffers() {
        let prelude = emit_prelude(&GeneratorOptions::default());
        assert!(prelude.contains("#define NB_KIND_MAX 128"));
        assert!(prelude.contains("#define NB_MESSAGE_MAX 512"));
        assert!(prelude.contains("intptr_t detail[3];"));
    }
}
